use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use garde::Validate;
use std::path::PathBuf;
use std::str::FromStr;

use super::{error, status_error, ApiError};
use crate::app_state::AppState;
use crate::models::catalog::{CatalogConfig, ProductEntry};
use crate::models::garment::title_case;
use crate::models::metadata::{is_valid_job_id, CatalogResponse, JobMetadata, JobRequest};
use crate::services::catalog::{self, CatalogError};
use crate::services::generators::Category;

/// File name of a job's catalog, from the first eight characters of its id.
pub fn catalog_file_name(job_id: &str) -> String {
    let short: String = job_id.chars().take(8).collect();
    format!("catalog_{short}.pdf")
}

/// Catalog entries for a job: generated renders when there are any,
/// otherwise the original uploads.
pub fn entries_for_job(metadata: &JobMetadata) -> Vec<ProductEntry> {
    if !metadata.generated_images.is_empty() {
        return metadata
            .generated_images
            .iter()
            .filter_map(|generated| {
                Some(ProductEntry {
                    primary: PathBuf::from(generated.full_body.as_ref()?),
                    secondary: generated.closeup.as_ref().map(PathBuf::from),
                    name: title_case(&generated.garment_name),
                    code: None,
                })
            })
            .collect();
    }

    metadata
        .images
        .iter()
        .map(|image| ProductEntry {
            primary: PathBuf::from(&image.path),
            secondary: None,
            name: title_case(&image.name),
            code: None,
        })
        .collect()
}

fn catalog_config_for(state: &AppState, metadata: &JobMetadata) -> CatalogConfig {
    let brand = metadata
        .brand_name
        .clone()
        .unwrap_or_else(|| state.config.default_brand.clone());
    let mut config = CatalogConfig::for_brand(&brand);

    if let Some(tagline) = &metadata.tagline {
        config.tagline = tagline.clone();
    }
    if let Some(title) = &metadata.collection_title {
        config.catalog_title = title.clone();
    }
    if let Some(category) = metadata
        .category
        .as_deref()
        .and_then(|c| Category::from_str(c).ok())
    {
        config.category_label = category.collection_label().to_string();
    }

    let logo = metadata
        .logo_path
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| state.config.logo_path_for(&brand));
    config.logo_path = logo.is_file().then_some(logo);
    config
}

/// POST /catalog: lay out the job's images into a PDF in its directory.
pub async fn create_catalog(
    State(state): State<AppState>,
    Json(request): Json<JobRequest>,
) -> Result<Json<CatalogResponse>, ApiError> {
    request
        .validate()
        .map_err(|report| error(StatusCode::BAD_REQUEST, report.to_string()))?;
    let job_id = request
        .job_id
        .ok_or_else(|| error(StatusCode::BAD_REQUEST, "jobId required"))?;

    let metadata = state.jobs.load(&job_id).map_err(status_error)?;
    let entries = entries_for_job(&metadata);
    let config = catalog_config_for(&state, &metadata);
    let output = state.jobs.job_dir(&job_id).join(catalog_file_name(&job_id));

    tracing::info!(job_id = %job_id, products = entries.len(), "Creating catalog");

    let pdf_path = tokio::task::spawn_blocking(move || catalog::create_catalog(&entries, &config, &output))
        .await
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| match e {
            CatalogError::NoEntries => error(StatusCode::BAD_REQUEST, "No images to place in the catalog"),
            other => {
                tracing::error!(job_id = %job_id, error = %other, "Catalog creation failed");
                error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        })?;

    let pdf_path = pdf_path.display().to_string();
    let recorded = pdf_path.clone();
    state
        .jobs
        .update(&job_id, move |m| m.pdf_path = Some(recorded))
        .map_err(status_error)?;

    Ok(Json(CatalogResponse {
        success: true,
        pdf_url: format!("/download/{job_id}"),
        pdf_path,
    }))
}

/// GET /download/{job_id}: the job's catalog as an attachment.
pub async fn download_catalog(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    if !is_valid_job_id(&job_id) || !state.jobs.exists(&job_id) {
        return Err(error(StatusCode::NOT_FOUND, "Job not found"));
    }

    let file_name = catalog_file_name(&job_id);
    let path = state.jobs.job_dir(&job_id).join(&file_name);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(error(StatusCode::NOT_FOUND, "PDF not found"));
        }
        Err(e) => return Err(error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    };

    Response::builder()
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        )
        .body(Body::from(bytes))
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metadata::{GeneratedImage, ImageInfo};

    #[test]
    fn test_catalog_file_name() {
        assert_eq!(catalog_file_name("0123456789abcdef"), "catalog_01234567.pdf");
        assert_eq!(catalog_file_name("abc"), "catalog_abc.pdf");
    }

    #[test]
    fn test_entries_prefer_generated_images() {
        let metadata = JobMetadata {
            images: vec![ImageInfo {
                name: "graphic_tee".into(),
                path: "/jobs/a/graphic_tee.png".into(),
            }],
            generated_images: vec![
                GeneratedImage {
                    garment_name: "graphic_tee".into(),
                    full_body: Some("/jobs/a/full_body_graphic_tee.png".into()),
                    closeup: None,
                },
                GeneratedImage {
                    garment_name: "lost".into(),
                    full_body: None,
                    closeup: None,
                },
            ],
            ..Default::default()
        };

        let entries = entries_for_job(&metadata);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Graphic Tee");
        assert_eq!(entries[0].primary, PathBuf::from("/jobs/a/full_body_graphic_tee.png"));
    }

    #[test]
    fn test_entries_fall_back_to_uploads() {
        let metadata = JobMetadata {
            images: vec![ImageInfo {
                name: "denim_jacket".into(),
                path: "/jobs/a/denim_jacket.png".into(),
            }],
            ..Default::default()
        };
        let entries = entries_for_job(&metadata);
        assert_eq!(entries[0].name, "Denim Jacket");
        assert!(entries[0].secondary.is_none());
    }
}
