use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use catalog_pipeline::config::{AppConfig, ConfigError};
use catalog_pipeline::models::catalog::CatalogConfig;
use catalog_pipeline::models::garment::BatchReport;
use catalog_pipeline::services::batch::{BatchError, BatchOrchestrator};
use catalog_pipeline::services::catalog::{self, CatalogError};
use catalog_pipeline::services::storage::{self, FileStore, R2Store, StorageError, StoredFile};
use catalog_pipeline::services::watcher::FolderWatcher;

#[derive(Parser, Debug)]
#[command(name = "pipeline")]
#[command(about = "Garment try-on rendering and catalog generation", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process every garment photo in a local directory
    Batch {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
        /// Skip catalog generation
        #[arg(long, default_value_t = false)]
        no_pdf: bool,
    },
    /// Watch the storage input folder and process new uploads
    Watch {
        /// Seconds between folder listings (default: WATCH_POLL_INTERVAL)
        #[arg(long)]
        poll_interval: Option<u64>,
    },
    /// Build a catalog from already rendered images
    Catalog {
        #[arg(long)]
        images: PathBuf,
        #[arg(short, long, default_value = "catalog.pdf")]
        output: PathBuf,
    },
    /// Check configuration and exit
    Validate,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Failed(String),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Batch { input, output, no_pdf } => run_batch(&config, &input, &output, !no_pdf).await,
        Commands::Watch { poll_interval } => {
            let interval = poll_interval.unwrap_or(config.watch_poll_interval);
            run_watch(&config, Duration::from_secs(interval.max(1))).await
        }
        Commands::Catalog { images, output } => run_catalog(&config, &images, &output),
        Commands::Validate => run_validate(&config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_batch(config: &AppConfig, input: &Path, output: &Path, generate_pdf: bool) -> Result<(), CliError> {
    let orchestrator = BatchOrchestrator::from_config(config)?
        .with_status_file(output.join("status.json"));
    let report = orchestrator.run_batch(input, output, generate_pdf).await;
    print_summary(&report);

    if report.success {
        Ok(())
    } else {
        Err(CliError::Failed(report.error.unwrap_or_else(|| "Batch failed".into())))
    }
}

fn print_summary(report: &BatchReport) {
    println!("\n{}", "=".repeat(50));
    println!("BATCH PROCESSING COMPLETE");
    println!("{}", "=".repeat(50));
    println!("Total processed: {}", report.total);
    println!("Successful: {}", report.succeeded);
    println!("Failed: {}", report.failed);
    if let Some(path) = &report.document_path {
        println!("Catalog: {}", path.display());
    }
    for item in report.items.iter().filter(|i| !i.success) {
        println!("  FAILED {}: {}", item.name, item.error.as_deref().unwrap_or("unknown error"));
    }
}

async fn run_watch(config: &AppConfig, poll_interval: Duration) -> Result<(), CliError> {
    config.validate()?;
    let orchestrator = Arc::new(BatchOrchestrator::from_config(config)?);
    let store: Arc<dyn FileStore> = Arc::new(R2Store::from_settings(&config.storage()?)?);

    let stop = CancellationToken::new();
    let signal = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping watcher");
            signal.cancel();
        }
    });

    let mut watcher = FolderWatcher::new(store.clone(), config.input_folder_id.clone(), poll_interval);
    tracing::info!(folder = %watcher.folder(), interval_secs = poll_interval.as_secs(), "Watching for new uploads");

    watcher
        .watch(stop, |files| {
            let orchestrator = orchestrator.clone();
            let store = store.clone();
            async move {
                if let Err(e) = process_upload(config, &orchestrator, store.as_ref(), &files).await {
                    tracing::error!(error = %e, files = files.len(), "Failed to process new uploads");
                }
            }
        })
        .await?;
    Ok(())
}

/// Download a set of new uploads, render them, and deliver the results.
async fn process_upload(
    config: &AppConfig,
    orchestrator: &BatchOrchestrator,
    store: &dyn FileStore,
    files: &[StoredFile],
) -> Result<(), CliError> {
    let batch = Uuid::new_v4().simple().to_string();
    let download_dir = config.temp_dir.join("downloads").join(&batch);
    let output_dir = config.output_dir.join(&batch);

    let paths = storage::download_batch(store, files, &download_dir).await?;
    tracing::info!(batch = %batch, count = paths.len(), "Downloaded new uploads");

    let report = orchestrator.run_batch(&download_dir, &output_dir, true).await;
    if !report.success {
        return Err(CliError::Failed(report.error.unwrap_or_else(|| "Batch failed".into())));
    }

    let delivered = storage::deliver_report(store, &report, &config.output_folder_id).await?;
    tracing::info!(
        batch = %batch,
        folder = %storage::batch_folder(&config.output_folder_id, &report),
        files = delivered.len(),
        succeeded = report.succeeded,
        failed = report.failed,
        "Delivered batch"
    );
    Ok(())
}

fn run_catalog(config: &AppConfig, images: &Path, output: &Path) -> Result<(), CliError> {
    let entries = catalog::entries_from_directory(images)?;
    let mut catalog_config = CatalogConfig::for_brand(&config.default_brand);
    let logo = config.brand_logo_path();
    catalog_config.logo_path = logo.is_file().then_some(logo);

    let path = catalog::create_catalog(&entries, &catalog_config, output)?;
    println!("Catalog created: {}", path.display());
    Ok(())
}

fn run_validate(config: &AppConfig) -> Result<(), CliError> {
    config.validate()?;
    println!("Configuration valid");

    if config.workflow_path.is_file() {
        println!("Workflow found: {}", config.workflow_path.display());
    } else {
        println!(
            "Warning: workflow file not found at {} (an empty workflow will be sent)",
            config.workflow_path.display()
        );
    }
    Ok(())
}
