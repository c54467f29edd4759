pub mod catalog;
pub mod generate;
pub mod health;
pub mod metrics;
pub mod upload;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::app_state::AppState;
use crate::services::status::StatusError;

/// JSON error body: `{"detail": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

pub fn error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            detail: detail.into(),
        }),
    )
}

/// 404 for unknown jobs, 500 for anything else.
pub(crate) fn status_error(err: StatusError) -> ApiError {
    match err {
        StatusError::JobNotFound(_) => error(StatusCode::NOT_FOUND, "Job not found"),
        other => {
            tracing::error!(error = %other, "Job metadata error");
            error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

/// Application routes, without the metrics endpoint and middleware layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/generate", post(generate::start_generation))
        .route("/catalog", post(catalog::create_catalog))
        .route("/download/{job_id}", get(catalog::download_catalog))
        .route("/drive/upload", post(upload::upload_catalog))
        .with_state(state)
}
