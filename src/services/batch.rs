use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::{AppConfig, ConfigError};
use crate::models::catalog::{CatalogConfig, ProductEntry};
use crate::models::garment::{output_keys, BatchReport, GarmentItem};
use crate::models::job::JobDescriptor;
use crate::models::metadata::{BatchStatus, RunStatus};
use crate::services::catalog::{self, CatalogError};
use crate::services::generators::{generator_for, load_base_workflow, GarmentGenerator};
use crate::services::image_prep::{self, FocusRegion, ImageError, GARMENT_TARGET_SIZE};
use crate::services::runpod::{ComputeError, RunpodClient};
use crate::services::status;

pub const IMAGES_DIR: &str = "HighRes_Images";
pub const PREPARED_DIR: &str = "temp";

/// Drives a directory of garment photos through preparation, remote
/// rendering and catalog assembly.
pub struct BatchOrchestrator {
    client: RunpodClient,
    generator: Box<dyn GarmentGenerator>,
    base_workflow: Value,
    catalog: CatalogConfig,
    concurrency: usize,
    status_file: Option<PathBuf>,
}

impl BatchOrchestrator {
    pub fn new(client: RunpodClient, generator: Box<dyn GarmentGenerator>, catalog: CatalogConfig) -> Self {
        Self {
            client,
            generator,
            base_workflow: Value::Object(Default::default()),
            catalog,
            concurrency: 1,
            status_file: None,
        }
    }

    /// Build from process configuration. Fails if compute credentials are
    /// missing, before any work starts.
    pub fn from_config(config: &AppConfig) -> Result<Self, BatchError> {
        Self::for_category(config, &config.default_category, &config.default_brand)
    }

    /// Like [`Self::from_config`] with an explicit category and brand.
    pub fn for_category(config: &AppConfig, category: &str, brand: &str) -> Result<Self, BatchError> {
        let compute = config.require_compute()?;
        let client = RunpodClient::from_settings(&compute)?;
        let generator = generator_for(category, brand, config.output_resolution);

        let mut catalog = CatalogConfig::for_brand(brand);
        catalog.category_label = generator.category().collection_label().to_string();
        catalog.logo_path = Some(config.logo_path_for(brand));

        Ok(Self::new(client, generator, catalog)
            .with_base_workflow(load_base_workflow(&config.workflow_path))
            .with_concurrency(config.batch_size))
    }

    pub fn with_base_workflow(mut self, workflow: Value) -> Self {
        self.base_workflow = workflow;
        self
    }

    /// Maximum number of garments in flight at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Progress document rewritten after every item.
    pub fn with_status_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.status_file = Some(path.into());
        self
    }

    /// Catalog file name for this orchestrator's brand.
    pub fn document_name(&self) -> String {
        format!("Final_Catalog_{}.pdf", self.generator.config().brand)
    }

    /// Process every supported image in `input`. Items are reported in
    /// sorted path order, one per discovered file, whatever order they
    /// finish in.
    pub async fn run_batch(&self, input: &Path, output: &Path, generate_document: bool) -> BatchReport {
        let batch_id = Uuid::new_v4();
        tracing::info!(%batch_id, input = %input.display(), output = %output.display(), "Starting batch processing");

        let paths = match discover_images(input) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::error!(%batch_id, error = %e, "Cannot read input directory");
                self.write_status(RunStatus::Error, 0, 0, Some(e.to_string())).await;
                return BatchReport::empty(batch_id, e.to_string());
            }
        };

        if paths.is_empty() {
            tracing::warn!(%batch_id, directory = %input.display(), "No images found");
            self.write_status(RunStatus::Error, 0, 0, Some("No images found".into())).await;
            return BatchReport::empty(batch_id, "No images found");
        }

        let total = paths.len();
        tracing::info!(%batch_id, count = total, "Found images");

        let images_dir = output.join(IMAGES_DIR);
        if let Err(e) = tokio::fs::create_dir_all(images_dir.join(PREPARED_DIR)).await {
            let message = format!("Cannot create output directory {}: {e}", images_dir.display());
            self.write_status(RunStatus::Error, 0, total, Some(message.clone())).await;
            return BatchReport::empty(batch_id, message);
        }
        self.write_status(RunStatus::Processing, 0, total, None).await;

        let keys = output_keys(&paths);
        let mut items = Vec::with_capacity(total);
        {
            let mut results = stream::iter(paths.iter().zip(&keys).enumerate())
                .map(|(index, (path, key))| self.process_item(path, key, &images_dir, index))
                .buffered(self.concurrency);

            while let Some(item) = results.next().await {
                items.push(item);
                self.write_status(RunStatus::Processing, items.len(), total, None).await;
            }
        }

        let mut report = BatchReport::from_items(batch_id, items, images_dir);
        tracing::info!(
            %batch_id,
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            "Garments processed"
        );

        if generate_document && report.succeeded > 0 {
            let destination = output.join(self.document_name());
            match self.render_catalog(&report, destination).await {
                Ok(path) => report.document_path = Some(path),
                Err(e) => tracing::error!(%batch_id, error = %e, "Catalog generation failed"),
            }
        }

        self.write_status(RunStatus::Complete, total, total, None).await;
        report
    }

    /// Prepare, render and post-process one garment. Never fails: any error
    /// is recorded on the returned item. Every file written for the item is
    /// named after `output_key`, which must be unique within `images_dir`.
    pub async fn process_item(
        &self,
        source: &Path,
        output_key: &str,
        images_dir: &Path,
        index: usize,
    ) -> GarmentItem {
        let item = GarmentItem::new(source).with_output_key(output_key);
        tracing::info!(path = %source.display(), "Processing garment");

        match self.try_process(item.clone(), images_dir, index).await {
            Ok(done) => done,
            Err((job_id, e)) => {
                tracing::error!(path = %source.display(), error = %e, "Failed to process garment");
                metrics::counter!("batch_items_failed_total").increment(1);
                GarmentItem { job_id, ..item }.failed(e.to_string())
            }
        }
    }

    async fn try_process(
        &self,
        mut item: GarmentItem,
        images_dir: &Path,
        index: usize,
    ) -> Result<GarmentItem, (Option<String>, BatchError)> {
        let prepared = images_dir.join(PREPARED_DIR).join(format!("{}.png", item.output_key));
        let source = item.source.clone();
        let target = prepared.clone();
        blocking(move || image_prep::prepare_garment(&source, &target, GARMENT_TARGET_SIZE))
            .await
            .map_err(|e| (None, e))?;

        let garment = tokio::fs::read(&prepared)
            .await
            .map_err(|e| (None, BatchError::io(&prepared, e)))?;

        let workflow = self.generator.build_workflow(&self.base_workflow, &item.name, index);
        let job = JobDescriptor::new(workflow).with_attachment("garment", garment);

        let outcome = self.client.submit(job, true).await;
        item.job_id = outcome.handle.as_ref().map(|h| h.to_string());
        let job_id = item.job_id.clone();

        if !outcome.is_success() {
            return Err((job_id, BatchError::Job(outcome.error_message())));
        }

        let (kind, bytes) = match (outcome.output("full_body"), outcome.output("final")) {
            (Some(bytes), _) => ("full_body", bytes),
            (None, Some(bytes)) => ("final", bytes),
            (None, None) => {
                return Err((job_id, BatchError::Job("Job completed without an image output".into())));
            }
        };

        let full_body = images_dir.join(format!("{kind}_{}.png", item.output_key));
        tokio::fs::write(&full_body, bytes)
            .await
            .map_err(|e| (job_id.clone(), BatchError::io(&full_body, e)))?;
        item.full_body_path = Some(full_body.clone());

        if kind == "full_body" {
            let closeup = images_dir.join(format!("closeup_{}.png", item.output_key));
            let target = closeup.clone();
            match blocking(move || image_prep::create_closeup(&full_body, &target, FocusRegion::Upper)).await {
                Ok(_) => item.closeup_path = Some(closeup),
                Err(e) => tracing::warn!(garment = %item.name, error = %e, "Could not derive closeup"),
            }
        }

        item.success = true;
        tracing::info!(garment = %item.name, job_id = ?item.job_id, "Garment rendered");
        Ok(item)
    }

    async fn render_catalog(&self, report: &BatchReport, destination: PathBuf) -> Result<PathBuf, BatchError> {
        let entries: Vec<ProductEntry> = report
            .successful()
            .filter_map(|item| {
                Some(ProductEntry {
                    primary: item.full_body_path.clone()?,
                    secondary: item.closeup_path.clone(),
                    name: item.display_name(),
                    code: None,
                })
            })
            .collect();
        let config = self.catalog.clone();

        tokio::task::spawn_blocking(move || catalog::create_catalog(&entries, &config, &destination))
            .await
            .map_err(|e| BatchError::Task(e.to_string()))?
            .map_err(BatchError::from)
    }

    async fn write_status(&self, status: RunStatus, current: usize, total: usize, error: Option<String>) {
        let Some(path) = self.status_file.clone() else {
            return;
        };
        let mut document = BatchStatus::new(status, current, total);
        document.error = error;
        let target = path.clone();
        let written = tokio::task::spawn_blocking(move || status::write_json(&target, &document))
            .await
            .map_err(|e| e.to_string())
            .and_then(|result| result.map_err(|e| e.to_string()));
        if let Err(e) = written {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write status file");
        }
    }
}

/// Run CPU-bound image work off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, BatchError>
where
    F: FnOnce() -> Result<T, ImageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| BatchError::Task(e.to_string()))?
        .map_err(BatchError::from)
}

/// Supported image files directly inside `dir`, sorted by path.
pub fn discover_images(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let read = std::fs::read_dir(dir).map_err(|e| BatchError::io(dir, e))?;
    let mut paths: Vec<PathBuf> = read
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && image_prep::is_supported(path))
        .collect();
    paths.sort();
    Ok(paths)
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Compute client error: {0}")]
    Compute(#[from] ComputeError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0}")]
    Job(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl BatchError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        BatchError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PNG", "a.jpg", "c.webp", "notes.txt", "d.gif"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let names: Vec<String> = discover_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.webp"]);
    }

    #[test]
    fn test_document_name_uses_brand() {
        let client = RunpodClient::new("http://127.0.0.1:9", "ep", "key").unwrap();
        let orchestrator = BatchOrchestrator::new(
            client,
            generator_for("teen_boy", "bono", 1024),
            CatalogConfig::for_brand("bono"),
        );
        assert_eq!(orchestrator.document_name(), "Final_Catalog_bono.pdf");
    }

    #[tokio::test]
    async fn test_empty_directory_reports_failure() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let client = RunpodClient::new("http://127.0.0.1:9", "ep", "key").unwrap();
        let orchestrator = BatchOrchestrator::new(
            client,
            generator_for("teen_boy", "bono", 1024),
            CatalogConfig::for_brand("bono"),
        )
        .with_status_file(output.path().join("status.json"));

        let report = orchestrator.run_batch(input.path(), output.path(), true).await;
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("No images found"));
        assert_eq!(report.total, 0);

        let status: serde_json::Value = status::read_json(&output.path().join("status.json")).unwrap();
        assert_eq!(status["status"], "error");
    }
}
