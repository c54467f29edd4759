use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;

use super::catalog::catalog_file_name;
use super::{error, status_error, ApiError};
use crate::app_state::AppState;
use crate::models::metadata::{JobRequest, UploadResponse};

/// POST /drive/upload: push the job's catalog to the output folder.
pub async fn upload_catalog(
    State(state): State<AppState>,
    Json(request): Json<JobRequest>,
) -> Result<Json<UploadResponse>, ApiError> {
    request
        .validate()
        .map_err(|report| error(StatusCode::BAD_REQUEST, report.to_string()))?;
    let job_id = request
        .job_id
        .ok_or_else(|| error(StatusCode::BAD_REQUEST, "jobId required"))?;

    let metadata = state.jobs.load(&job_id).map_err(status_error)?;
    let pdf = state.jobs.job_dir(&job_id).join(catalog_file_name(&job_id));
    let bytes = match tokio::fs::read(&pdf).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(error(StatusCode::NOT_FOUND, "PDF not found"));
        }
        Err(e) => return Err(error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    };

    let store = state
        .storage
        .as_ref()
        .ok_or_else(|| error(StatusCode::INTERNAL_SERVER_ERROR, "Storage not configured"))?;

    let brand = metadata
        .brand_name
        .unwrap_or_else(|| state.config.default_brand.clone());
    let short: String = job_id.chars().take(8).collect();
    let name = format!("Catalog_{brand}_{short}.pdf");

    let stored = store
        .upload(bytes, &state.config.output_folder_id, &name, "application/pdf")
        .await
        .map_err(|e| {
            tracing::error!(job_id = %job_id, error = %e, "Catalog upload failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;
    let drive_url = store.link(&stored.id);

    let (file_id, url) = (stored.id.clone(), drive_url.clone());
    state
        .jobs
        .update(&job_id, move |m| {
            m.drive_file_id = Some(file_id);
            m.drive_url = Some(url);
        })
        .map_err(status_error)?;

    tracing::info!(job_id = %job_id, file_id = %stored.id, "Catalog uploaded");
    Ok(Json(UploadResponse {
        success: true,
        file_id: stored.id,
        drive_url,
    }))
}
