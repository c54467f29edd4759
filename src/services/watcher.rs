use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::services::storage::{list_images, FileStore, StorageError, StoredFile};

/// Polls one storage folder and reports image files that appeared since the
/// previous listing. The known-id set belongs to this instance and only grows.
pub struct FolderWatcher {
    store: Arc<dyn FileStore>,
    folder: String,
    poll_interval: Duration,
    known: HashSet<String>,
}

impl FolderWatcher {
    pub fn new(store: Arc<dyn FileStore>, folder: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            store,
            folder: folder.into(),
            poll_interval,
            known: HashSet::new(),
        }
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    /// Record everything currently in the folder as already seen.
    pub async fn prime(&mut self) -> Result<usize, StorageError> {
        let files = list_images(self.store.as_ref(), &self.folder).await?;
        self.known.extend(files.into_iter().map(|f| f.id));
        Ok(self.known.len())
    }

    /// List the folder once and return files not seen before, marking them
    /// as known.
    pub async fn poll_once(&mut self) -> Result<Vec<StoredFile>, StorageError> {
        let files = list_images(self.store.as_ref(), &self.folder).await?;
        let fresh: Vec<StoredFile> = files
            .into_iter()
            .filter(|f| !self.known.contains(&f.id))
            .collect();
        self.known.extend(fresh.iter().map(|f| f.id.clone()));
        Ok(fresh)
    }

    /// Prime, then poll until `stop` is cancelled, calling `on_new` once per
    /// listing that found new files. Only the initial listing can fail;
    /// later listing errors are logged and the loop carries on.
    pub async fn watch<F, Fut>(&mut self, stop: CancellationToken, mut on_new: F) -> Result<(), StorageError>
    where
        F: FnMut(Vec<StoredFile>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let initial = self.prime().await?;
        tracing::info!(folder = %self.folder, initial_files = initial, "Started watching folder");

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            match self.poll_once().await {
                Ok(fresh) if fresh.is_empty() => {
                    tracing::debug!(folder = %self.folder, "No new files");
                }
                Ok(fresh) => {
                    tracing::info!(folder = %self.folder, count = fresh.len(), "New files detected");
                    on_new(fresh).await;
                }
                Err(e) => {
                    tracing::error!(folder = %self.folder, error = %e, "Error watching folder");
                }
            }
        }

        tracing::info!(folder = %self.folder, "Stopped watching folder");
        Ok(())
    }
}
