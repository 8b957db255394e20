//! HTTP adapter for the issuance engine.
//!
//! Deliberately thin: one route, a static shared-secret check, and a JSON
//! error mapping. All issuance semantics live in [`crate::engine`]; this
//! module only acquires inputs and presents outputs.

pub mod handlers;
pub mod routes;
