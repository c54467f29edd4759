use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use std::path::{Path, PathBuf};

use super::{error, status_error, ApiError};
use crate::app_state::AppState;
use crate::models::garment::output_keys;
use crate::models::metadata::{
    progress_percent, GenerateRequest, GenerateResponse, GeneratedImage, JobMetadata, RunStatus,
};
use crate::services::batch::{BatchOrchestrator, PREPARED_DIR};
use crate::services::status::JobStore;

/// POST /generate: record the job and render its garments in the background.
pub async fn start_generation(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<GenerateResponse>), ApiError> {
    request
        .validate()
        .map_err(|report| error(StatusCode::BAD_REQUEST, report.to_string()))?;

    let GenerateRequest { job_id, mut metadata } = request;
    metadata.status = Some(RunStatus::Generating);
    metadata.status_message = Some("Starting AI model generation...".to_string());
    metadata.error = None;
    state.jobs.save(&job_id, &metadata).map_err(status_error)?;

    tracing::info!(job_id = %job_id, images = metadata.images.len(), "Generation started");

    let task_state = state.clone();
    let task_job_id = job_id.clone();
    tokio::spawn(async move {
        run_generation(task_state, task_job_id, metadata).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateResponse {
            status: "started".to_string(),
            job_id,
        }),
    ))
}

/// Background half of `/generate`. Progress is only shared through the job's
/// metadata file. Each write reloads the file and changes only the progress
/// fields, so a concurrent `/catalog` or `/drive/upload` result survives.
async fn run_generation(state: AppState, job_id: String, metadata: JobMetadata) {
    let category = metadata
        .category
        .clone()
        .unwrap_or_else(|| state.config.default_category.clone());
    let brand = metadata
        .brand_name
        .clone()
        .unwrap_or_else(|| state.config.default_brand.clone());

    let orchestrator = match BatchOrchestrator::for_category(&state.config, &category, &brand) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Cannot start generation");
            fail(&state.jobs, &job_id, e.to_string()).await;
            return;
        }
    };

    let output_dir = state.jobs.job_dir(&job_id).join("generated");
    if let Err(e) = tokio::fs::create_dir_all(output_dir.join(PREPARED_DIR)).await {
        let message = format!("Cannot create {}: {e}", output_dir.display());
        fail(&state.jobs, &job_id, message).await;
        return;
    }

    let images = metadata.images;
    let total = images.len();
    let sources: Vec<PathBuf> = images.iter().map(|image| PathBuf::from(&image.path)).collect();
    let keys = output_keys(&sources);
    let mut generated = Vec::new();

    for (index, image) in images.iter().enumerate() {
        let message = format!("Generating model for {}...", image.name);
        record(&state.jobs, &job_id, move |m| {
            m.current_item = Some(index + 1);
            m.progress = Some(progress_percent(index, total));
            m.status_message = Some(message);
        })
        .await;

        let item = orchestrator
            .process_item(&sources[index], &keys[index], &output_dir, index)
            .await;

        if item.success {
            generated.push(GeneratedImage {
                garment_name: image.name.clone(),
                full_body: item.full_body_path.as_deref().map(path_string),
                closeup: item.closeup_path.as_deref().map(path_string),
            });
        } else {
            tracing::warn!(
                job_id = %job_id,
                garment = %image.name,
                error = item.error.as_deref().unwrap_or_default(),
                "Garment failed"
            );
        }
    }

    let count = generated.len();
    if count == 0 && total > 0 {
        tracing::error!(job_id = %job_id, total, "No garment could be generated");
        fail(&state.jobs, &job_id, format!("All {total} garments failed to generate")).await;
        return;
    }

    record(&state.jobs, &job_id, move |m| {
        m.generated_images = generated;
        m.status = Some(RunStatus::Complete);
        m.progress = Some(100);
        m.status_message = Some("Generation complete!".to_string());
    })
    .await;
    tracing::info!(job_id = %job_id, generated = count, total, "Generation complete");
}

fn path_string(path: &Path) -> String {
    path.display().to_string()
}

async fn fail(jobs: &JobStore, job_id: &str, message: String) {
    record(jobs, job_id, move |m| {
        m.status = Some(RunStatus::Error);
        m.status_message = Some(format!("Error: {message}"));
        m.error = Some(message);
    })
    .await;
}

/// Apply `change` to the stored metadata on the blocking pool.
async fn record<F>(jobs: &JobStore, job_id: &str, change: F)
where
    F: FnOnce(&mut JobMetadata) + Send + 'static,
{
    let jobs = jobs.clone();
    let id = job_id.to_string();
    match tokio::task::spawn_blocking(move || jobs.update(&id, change)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => tracing::error!(job_id = %job_id, error = %e, "Failed to write job metadata"),
        Err(e) => tracing::error!(job_id = %job_id, error = %e, "Metadata write task failed"),
    }
}
