use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::StorageSettings;
use crate::models::garment::BatchReport;
use crate::services::image_prep;

const IMAGE_MIME_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/webp"];

/// A file held by a [`FileStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    /// Store-specific identifier, stable for the lifetime of the file.
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: Option<u64>,
    pub modified: Option<String>,
}

impl StoredFile {
    pub fn is_image(&self) -> bool {
        IMAGE_MIME_TYPES.contains(&self.mime_type.as_str())
    }
}

/// Folder-oriented file storage used for intake and delivery.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Files directly inside `folder`.
    async fn list(&self, folder: &str) -> Result<Vec<StoredFile>, StorageError>;

    async fn download(&self, id: &str) -> Result<Vec<u8>, StorageError>;

    async fn upload(
        &self,
        bytes: Vec<u8>,
        folder: &str,
        name: &str,
        content_type: &str,
    ) -> Result<StoredFile, StorageError>;

    /// Link to a stored file that can be handed to a user.
    fn link(&self, id: &str) -> String {
        id.to_string()
    }
}

/// Cloudflare R2 (S3-compatible) store. Folders are key prefixes and a
/// file's id is its object key.
pub struct R2Store {
    bucket: Box<Bucket>,
    endpoint: String,
}

impl R2Store {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?
            .with_path_style();

        Ok(Self {
            bucket,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &StorageSettings) -> Result<Self, StorageError> {
        Self::new(
            &settings.bucket,
            &settings.endpoint,
            &settings.access_key,
            &settings.secret_key,
        )
    }
}

fn folder_prefix(folder: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        String::new()
    } else {
        format!("{folder}/")
    }
}

fn mime_type_or_binary(name: &str) -> String {
    image_prep::mime_type_for(name)
        .unwrap_or("application/octet-stream")
        .to_string()
}

#[async_trait]
impl FileStore for R2Store {
    async fn list(&self, folder: &str) -> Result<Vec<StoredFile>, StorageError> {
        let prefix = folder_prefix(folder);
        let pages = self
            .bucket
            .list(prefix.clone(), Some("/".to_string()))
            .await?;

        let files = pages
            .into_iter()
            .flat_map(|page| page.contents)
            .filter(|object| object.key != prefix)
            .map(|object| {
                let name = object.key.rsplit('/').next().unwrap_or(&object.key).to_string();
                StoredFile {
                    mime_type: mime_type_or_binary(&name),
                    id: object.key,
                    name,
                    size: Some(object.size),
                    modified: Some(object.last_modified),
                }
            })
            .collect();
        Ok(files)
    }

    async fn download(&self, id: &str) -> Result<Vec<u8>, StorageError> {
        let response = self.bucket.get_object(id).await?;
        Ok(response.to_vec())
    }

    async fn upload(
        &self,
        bytes: Vec<u8>,
        folder: &str,
        name: &str,
        content_type: &str,
    ) -> Result<StoredFile, StorageError> {
        let key = format!("{}{}", folder_prefix(folder), name);
        let size = bytes.len() as u64;
        self.bucket
            .put_object_with_content_type(&key, &bytes, content_type)
            .await?;

        tracing::info!(key = %key, size, "Uploaded file");
        Ok(StoredFile {
            id: key,
            name: name.to_string(),
            mime_type: content_type.to_string(),
            size: Some(size),
            modified: None,
        })
    }

    fn link(&self, id: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket.name(), id)
    }
}

/// Image files (png, jpeg, webp) directly inside `folder`.
pub async fn list_images(store: &dyn FileStore, folder: &str) -> Result<Vec<StoredFile>, StorageError> {
    let files = store.list(folder).await?;
    Ok(files.into_iter().filter(StoredFile::is_image).collect())
}

/// Download each file to `dir/<name>`, returning the local paths in order.
pub async fn download_batch(
    store: &dyn FileStore,
    files: &[StoredFile],
    dir: &Path,
) -> Result<Vec<PathBuf>, StorageError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| StorageError::io(dir, e))?;

    let mut downloaded = Vec::with_capacity(files.len());
    for file in files {
        let bytes = store.download(&file.id).await?;
        let dest = dir.join(&file.name);
        tokio::fs::write(&dest, &bytes)
            .await
            .map_err(|e| StorageError::io(&dest, e))?;
        tracing::info!(file_id = %file.id, destination = %dest.display(), "Downloaded file");
        downloaded.push(dest);
    }
    Ok(downloaded)
}

/// Upload a local file under its own name, guessing the content type.
pub async fn upload_path(
    store: &dyn FileStore,
    path: &Path,
    folder: &str,
) -> Result<StoredFile, StorageError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::Config(format!("Invalid file name: {}", path.display())))?;
    let content_type = if name.to_ascii_lowercase().ends_with(".pdf") {
        "application/pdf".to_string()
    } else {
        mime_type_or_binary(name)
    };

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    store.upload(bytes, folder, name, &content_type).await
}

/// Folder that receives one batch's deliverables: `<folder>/<batch id>`.
pub fn batch_folder(folder: &str, report: &BatchReport) -> String {
    format!("{}/{}", folder.trim_end_matches('/'), report.batch_id.simple())
}

/// Upload a batch's catalog and renders into its own [`batch_folder`], so
/// that later batches with the same file names do not replace them.
pub async fn deliver_report(
    store: &dyn FileStore,
    report: &BatchReport,
    folder: &str,
) -> Result<Vec<StoredFile>, StorageError> {
    let destination = batch_folder(folder, report);
    let mut uploaded = Vec::new();

    if let Some(document) = &report.document_path {
        let stored = upload_path(store, document, &destination).await?;
        tracing::info!(file_id = %stored.id, "Uploaded catalog");
        uploaded.push(stored);
    }
    for item in report.successful() {
        for path in [&item.full_body_path, &item.closeup_path].into_iter().flatten() {
            uploaded.push(upload_path(store, path, &destination).await?);
        }
    }
    Ok(uploaded)
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Storage configuration error: {0}")]
    Config(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
