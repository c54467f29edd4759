//! JSON status documents read by external observers.
//!
//! Every write goes to a temporary file in the target directory and is then
//! renamed over the destination, so a reader sees either the previous or the
//! new document, never a partial one.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::models::metadata::JobMetadata;

pub const METADATA_FILE: &str = "metadata.json";

/// Atomically replace `path` with the pretty-printed JSON of `value`.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StatusError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| StatusError::io(&dir, e))?;

    let bytes = serde_json::to_vec_pretty(value)?;
    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| StatusError::io(&dir, e))?;
    tmp.write_all(&bytes).map_err(|e| StatusError::io(path, e))?;
    tmp.persist(path).map_err(|e| StatusError::io(path, e.error))?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StatusError> {
    let bytes = std::fs::read(path).map_err(|e| StatusError::io(path, e))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Per-job directories under the API's jobs root.
#[derive(Debug, Clone)]
pub struct JobStore {
    root: PathBuf,
}

impl JobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.root.join(job_id)
    }

    pub fn metadata_path(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join(METADATA_FILE)
    }

    /// A job exists once its metadata file has been written.
    pub fn exists(&self, job_id: &str) -> bool {
        self.metadata_path(job_id).is_file()
    }

    pub fn load(&self, job_id: &str) -> Result<JobMetadata, StatusError> {
        if !self.exists(job_id) {
            return Err(StatusError::JobNotFound(job_id.to_string()));
        }
        read_json(&self.metadata_path(job_id))
    }

    pub fn save(&self, job_id: &str, metadata: &JobMetadata) -> Result<(), StatusError> {
        write_json(&self.metadata_path(job_id), metadata)
    }

    /// Load, apply `change`, save. Concurrent updaters are last-write-wins.
    pub fn update<F>(&self, job_id: &str, change: F) -> Result<JobMetadata, StatusError>
    where
        F: FnOnce(&mut JobMetadata),
    {
        let mut metadata = self.load(job_id)?;
        change(&mut metadata);
        self.save(job_id, &metadata)?;
        Ok(metadata)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid status document: {0}")]
    Json(#[from] serde_json::Error),
}

impl StatusError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StatusError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
