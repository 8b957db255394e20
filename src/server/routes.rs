use axum::{routing::post, Router};

use crate::server::handlers::{issue_license_handler, AppState};

/// Build the application router.
///
/// This is a convenience helper so `main.rs` or tests can construct the
/// router in a single call.
///
/// # Routes
///
/// - `POST /api/v1/issue` - Issue a license token for a machine id and
///   expiry date, guarded by the static shared secret
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/issue", post(issue_license_handler))
        .with_state(state)
}
