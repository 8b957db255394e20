//! Request handlers for the HTTP issuance endpoint.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::Issuer;
use crate::errors::LicenseError;
use crate::key_material::KeyProvider;

/// Shared application state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub issuer: Arc<Issuer<Box<dyn KeyProvider>>>,
    pub shared_secret: String,
}

/// Standard error response body for HTTP errors.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: String,
    pub error: String,
}

/// Map internal LicenseError into an HTTP response Axum understands.
///
/// This lets handlers return `Result<Json<T>, LicenseError>` and Axum will
/// convert both success and error into HTTP responses.
impl IntoResponse for LicenseError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = ErrorResponse {
            success: false,
            code: self.code().to_string(),
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Request structure for license issuance.
#[derive(Debug, Deserialize, Serialize)]
pub struct IssueRequest {
    pub machine_id: String,
    /// Expiry date in strict `YYYY-MM-DD` form
    pub expiry_date: String,
    /// Static shared secret authorizing the request
    pub secret: String,
}

/// Response structure for license issuance.
#[derive(Debug, Deserialize, Serialize)]
pub struct IssueResponse {
    pub success: bool,
    pub token: String,
    pub machine_id: String,
    pub expiry_date: String,
}

/// Handler for issuing a license token.
///
/// Authorization is a static shared-secret comparison; everything beyond
/// that is out of scope for this service.
pub async fn issue_license_handler(
    State(state): State<AppState>,
    Json(payload): Json<IssueRequest>,
) -> Response {
    if payload.secret != state.shared_secret {
        warn!(machine_id = %payload.machine_id, "issue request with invalid shared secret");
        let body = ErrorResponse {
            success: false,
            code: "UNAUTHORIZED".to_string(),
            error: "invalid shared secret".to_string(),
        };
        return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    }

    match state.issuer.issue_now(&payload.machine_id, &payload.expiry_date) {
        Ok(token) => {
            let body = IssueResponse {
                success: true,
                token,
                machine_id: payload.machine_id.trim().to_string(),
                expiry_date: payload.expiry_date,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => err.into_response(),
    }
}
