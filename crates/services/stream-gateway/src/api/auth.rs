//! Credential validation endpoint

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};

use twitchcast_session::Credentials;

use super::{ApiError, AppState};

/// Request body for credential validation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub client_id: String,
    pub client_secret: String,
}

/// Validation outcome; a rejection is data, not an HTTP error
#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Check client credentials with Twitch
///
/// POST /api/auth/validate
pub async fn validate_credentials(
    State(state): State<AppState>,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let Json(req) = payload?;
    let credentials = Credentials::new(req.client_id, req.client_secret);

    let response = match state.session_manager.verify(&credentials).await {
        Ok(()) => ValidateResponse {
            valid: true,
            message: Some("Credentials are valid".to_string()),
            error: None,
        },
        Err(_) => ValidateResponse {
            valid: false,
            message: None,
            error: Some("Invalid credentials".to_string()),
        },
    };

    Ok(Json(response))
}
