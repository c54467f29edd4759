use garde::Validate;
use serde::Deserialize;
use std::path::PathBuf;

/// Process configuration, read from the environment (and an optional `.env`).
///
/// Required credentials default to empty strings so that a missing value
/// surfaces as a validation error listing every problem at once, rather than
/// as a deserialization failure on the first missing key.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AppConfig {
    /// HTTP bind address for the API server.
    #[serde(default = "default_bind_addr")]
    #[garde(skip)]
    pub bind_addr: String,

    /// RunPod API key
    #[serde(default)]
    #[garde(length(min = 1))]
    pub runpod_api_key: String,

    /// RunPod serverless endpoint ID
    #[serde(default)]
    #[garde(length(min = 1))]
    pub runpod_endpoint_id: String,

    #[serde(default = "default_runpod_base_url")]
    #[garde(length(min = 1))]
    pub runpod_base_url: String,

    /// Upper bound on a single job, in seconds.
    #[serde(default = "default_runpod_timeout")]
    #[garde(range(min = 1))]
    pub runpod_timeout: u64,

    /// Seconds between status polls.
    #[serde(default = "default_runpod_poll_interval")]
    #[garde(range(min = 1))]
    pub runpod_poll_interval: u64,

    /// R2 bucket name
    #[serde(default)]
    #[garde(length(min = 1))]
    pub r2_bucket: String,

    /// R2 endpoint URL
    #[serde(default)]
    #[garde(length(min = 1))]
    pub r2_endpoint: String,

    /// R2 access key ID (S3-compatible)
    #[serde(default)]
    #[garde(length(min = 1))]
    pub r2_access_key: String,

    /// R2 secret access key (S3-compatible)
    #[serde(default)]
    #[garde(length(min = 1))]
    pub r2_secret_key: String,

    /// Storage folder (key prefix) watched for new garment photos.
    #[serde(default)]
    #[garde(length(min = 1))]
    pub input_folder_id: String,

    /// Storage folder (key prefix) that receives catalogs and renders.
    #[serde(default)]
    #[garde(length(min = 1))]
    pub output_folder_id: String,

    #[serde(default = "default_category")]
    #[garde(skip)]
    pub default_category: String,

    #[serde(default = "default_brand")]
    #[garde(length(min = 1))]
    pub default_brand: String,

    #[serde(default = "default_output_resolution")]
    #[garde(range(min = 256))]
    pub output_resolution: u32,

    /// Maximum number of garments in flight against the compute endpoint.
    #[serde(default = "default_batch_size")]
    #[garde(range(min = 1, max = 64))]
    pub batch_size: usize,

    #[serde(default = "default_watch_poll_interval")]
    #[garde(range(min = 1))]
    pub watch_poll_interval: u64,

    #[serde(default = "default_assets_dir")]
    #[garde(skip)]
    pub assets_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    #[garde(skip)]
    pub output_dir: PathBuf,

    #[serde(default = "default_temp_dir")]
    #[garde(skip)]
    pub temp_dir: PathBuf,

    /// Root of per-job directories used by the HTTP API.
    #[serde(default = "default_temp_dir")]
    #[garde(skip)]
    pub jobs_dir: PathBuf,

    #[serde(default = "default_workflow_path")]
    #[garde(skip)]
    pub workflow_path: PathBuf,
}

/// The subset of configuration needed to talk to the compute endpoint.
#[derive(Debug, Clone, Validate)]
pub struct ComputeSettings {
    #[garde(length(min = 1))]
    pub api_key: String,
    #[garde(length(min = 1))]
    pub endpoint_id: String,
    #[garde(length(min = 1))]
    pub base_url: String,
    #[garde(range(min = 1))]
    pub timeout_secs: u64,
    #[garde(range(min = 1))]
    pub poll_interval_secs: u64,
}

/// The subset of configuration needed to talk to object storage.
#[derive(Debug, Clone, Validate)]
pub struct StorageSettings {
    #[garde(length(min = 1))]
    pub bucket: String,
    #[garde(length(min = 1))]
    pub endpoint: String,
    #[garde(length(min = 1))]
    pub access_key: String,
    #[garde(length(min = 1))]
    pub secret_key: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_runpod_base_url() -> String {
    "https://api.runpod.ai/v2".to_string()
}

fn default_runpod_timeout() -> u64 {
    300
}

fn default_runpod_poll_interval() -> u64 {
    5
}

fn default_category() -> String {
    "teen_boy".to_string()
}

fn default_brand() -> String {
    "bono".to_string()
}

fn default_output_resolution() -> u32 {
    4096
}

fn default_batch_size() -> usize {
    5
}

fn default_watch_poll_interval() -> u64 {
    60
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_workflow_path() -> PathBuf {
    PathBuf::from("./workflow_api.json")
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        envy::from_env().map_err(ConfigError::Env)
    }

    /// Validate every required setting (compute, storage and folder ids).
    pub fn validate(&self) -> Result<(), ConfigError> {
        Validate::validate(self).map_err(|report| ConfigError::Invalid(report.to_string()))
    }

    /// Compute credentials, validated. Fails before any work is attempted.
    pub fn require_compute(&self) -> Result<ComputeSettings, ConfigError> {
        let settings = ComputeSettings {
            api_key: self.runpod_api_key.clone(),
            endpoint_id: self.runpod_endpoint_id.clone(),
            base_url: self.runpod_base_url.clone(),
            timeout_secs: self.runpod_timeout,
            poll_interval_secs: self.runpod_poll_interval,
        };
        settings
            .validate()
            .map_err(|report| ConfigError::Invalid(report.to_string()))?;
        Ok(settings)
    }

    /// Storage credentials, validated.
    pub fn storage(&self) -> Result<StorageSettings, ConfigError> {
        let settings = StorageSettings {
            bucket: self.r2_bucket.clone(),
            endpoint: self.r2_endpoint.clone(),
            access_key: self.r2_access_key.clone(),
            secret_key: self.r2_secret_key.clone(),
        };
        settings
            .validate()
            .map_err(|report| ConfigError::Invalid(report.to_string()))?;
        Ok(settings)
    }

    /// Location of the brand mark used on catalog covers.
    pub fn brand_logo_path(&self) -> PathBuf {
        self.logo_path_for(&self.default_brand)
    }

    pub fn logo_path_for(&self, brand: &str) -> PathBuf {
        self.assets_dir
            .join("logos")
            .join(format!("{}.png", brand.to_lowercase()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Configuration errors: {0}")]
    Invalid(String),
}
