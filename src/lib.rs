//! keyforge - machine-bound license issuance
//!
//! keyforge turns `(machine id, expiry date)` into an opaque token that a
//! client application can verify offline with the matching public key. The
//! token pipeline is fixed: a JSON payload is SHA-256 digested and signed
//! with RSA-PSS, the signed document is serialized, gzip-compressed, and
//! base64-encoded.
//!
//! # Features
//!
//! - `server` - HTTP issuance endpoint (axum router + server binary).
//!   Enabled by default; disable it for library-only or CLI-only use:
//!
//! ```toml
//! keyforge = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use keyforge::engine::Issuer;
//! use keyforge::key_material::DirectProvider;
//! use keyforge::key_source::FileSource;
//!
//! let provider = DirectProvider::new(FileSource::new("keys/private.pem"));
//! let token = Issuer::new(provider).issue_now("machine-aabbcc", "2025-06-15")?;
//! # Ok::<(), keyforge::errors::LicenseError>(())
//! ```

// Core modules (always available)
pub mod config;
pub mod engine;
pub mod errors;
pub mod expiry;
pub mod key_material;
pub mod key_source;
pub mod keypair;
pub mod signer;
pub mod token;

// HTTP adapter (requires "server" feature)
#[cfg(feature = "server")]
#[path = "server/mod.rs"]
pub mod server;
