//! HTTP API for the Keygate server.
//!
//! Exposes the guest-safe health read and boot snapshot plus the three
//! operator-triggered license operations. The health endpoints never error
//! for a well-formed request; operation errors map onto status codes by
//! taxonomy: 400 validation, 409 authoritative rejection, 503 connectivity
//! (retryable), 500 storage.

mod config;

pub use config::ServerConfig;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use keygate_authority::RejectionKind;
use keygate_core::{HealthSnapshot, LicenseEngine, LicenseError, LicenseStatus, OpReport};
use serde::{Deserialize, Serialize};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<LicenseEngine>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ActivateRequest {
    pub license_key: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ValidateRequest {
    pub license_key: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct DeactivateRequest {
    pub license_key: String,
    pub token: String,
}

/// Response shape shared by all three operations.
#[derive(Serialize, Deserialize, Debug)]
pub struct OpResponse {
    pub ok: bool,
    pub status: LicenseStatus,
    pub remaining_activations: Option<u32>,
    pub message: String,
}

impl From<OpReport> for OpResponse {
    fn from(report: OpReport) -> Self {
        Self {
            ok: true,
            status: report.status,
            remaining_activations: report.remaining_activations,
            message: report.message,
        }
    }
}

/// Error body for failed operations. Messages are display-safe.
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<RejectionKind>,
}

/// Maps [`LicenseError`] onto HTTP status codes.
pub struct ApiError(pub LicenseError);

impl From<LicenseError> for ApiError {
    fn from(err: LicenseError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, kind) = match &self.0 {
            LicenseError::Validation(_) => (StatusCode::BAD_REQUEST, None),
            LicenseError::Rejected { kind, .. } => (StatusCode::CONFLICT, Some(*kind)),
            LicenseError::Unreachable(_) => (StatusCode::SERVICE_UNAVAILABLE, None),
            LicenseError::Storage(_) | LicenseError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };
        let body = ErrorResponse {
            ok: false,
            error: self.0.to_string(),
            kind,
        };
        (code, Json(body)).into_response()
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthSnapshot> {
    Json(state.engine.health().await)
}

/// Boot snapshot: same payload as the health read, fetched once at session
/// start so the watchdog can arm without an immediate network call.
async fn boot_handler(State(state): State<AppState>) -> Json<HealthSnapshot> {
    Json(state.engine.health().await)
}

async fn activate_handler(
    State(state): State<AppState>,
    Json(req): Json<ActivateRequest>,
) -> Result<Json<OpResponse>, ApiError> {
    let report = state.engine.activate(&req.license_key).await?;
    Ok(Json(report.into()))
}

async fn validate_handler(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<OpResponse>, ApiError> {
    let report = state.engine.validate(Some(&req.license_key)).await?;
    Ok(Json(report.into()))
}

async fn deactivate_handler(
    State(state): State<AppState>,
    Json(req): Json<DeactivateRequest>,
) -> Result<Json<OpResponse>, ApiError> {
    let report = state
        .engine
        .deactivate(&req.license_key, &req.token)
        .await?;
    Ok(Json(report.into()))
}

/// Builds the HTTP API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/boot", get(boot_handler))
        .route("/api/v1/license/activate", post(activate_handler))
        .route("/api/v1/license/validate", post(validate_handler))
        .route("/api/v1/license/deactivate", post(deactivate_handler))
        .with_state(state)
}
