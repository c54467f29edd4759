//! Test doubles: a local stand-in for the RunPod endpoint and an in-memory
//! file store.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use catalog_pipeline::services::runpod::RunpodClient;
use catalog_pipeline::services::storage::{FileStore, StorageError, StoredFile};

use crate::fixtures::png_bytes;

pub const ENDPOINT_ID: &str = "test-endpoint";

/// How the mock endpoint answers status queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Every job stays `IN_PROGRESS` forever.
    NeverFinishes,
    /// Every job is `COMPLETED` with a `full_body` PNG output.
    Completes,
    /// Every job is `FAILED` with an error message.
    Fails,
    /// Status queries hang for ten seconds, then report `IN_PROGRESS`.
    Stalls,
    /// The first `n` status queries answer HTTP 500, later ones `COMPLETED`.
    ErrorsThenCompletes(usize),
}

struct MockState {
    behavior: MockBehavior,
    output: String,
    submissions: AtomicUsize,
    status_queries: AtomicUsize,
    cancellations: AtomicUsize,
    payloads: Mutex<Vec<Value>>,
}

/// A RunPod-compatible endpoint bound to an ephemeral local port.
pub struct MockRunpod {
    pub addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockRunpod {
    pub async fn start(behavior: MockBehavior) -> Self {
        let output = base64::engine::general_purpose::STANDARD.encode(png_bytes(200, 400));
        let state = Arc::new(MockState {
            behavior,
            output,
            submissions: AtomicUsize::new(0),
            status_queries: AtomicUsize::new(0),
            cancellations: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route(&format!("/{ENDPOINT_ID}/run"), post(run))
            .route(&format!("/{ENDPOINT_ID}/status/{{id}}"), get(status))
            .route(&format!("/{ENDPOINT_ID}/cancel/{{id}}"), post(cancel))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client pointed at this endpoint with the given timing, in seconds.
    pub fn client(&self, timeout_secs: u64, poll_interval_secs: u64) -> RunpodClient {
        RunpodClient::new(&self.base_url(), ENDPOINT_ID, "test-key")
            .unwrap()
            .with_timing(timeout_secs, poll_interval_secs)
    }

    pub fn submissions(&self) -> usize {
        self.state.submissions.load(Ordering::SeqCst)
    }

    pub fn status_queries(&self) -> usize {
        self.state.status_queries.load(Ordering::SeqCst)
    }

    pub fn cancellations(&self) -> usize {
        self.state.cancellations.load(Ordering::SeqCst)
    }

    /// Bodies received on `/run`, in arrival order.
    pub fn payloads(&self) -> Vec<Value> {
        self.state.payloads.lock().unwrap().clone()
    }
}

async fn run(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Json<Value> {
    let n = state.submissions.fetch_add(1, Ordering::SeqCst) + 1;
    state.payloads.lock().unwrap().push(body);
    Json(json!({ "id": format!("job-{n}"), "status": "IN_QUEUE" }))
}

async fn status(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    let n = state.status_queries.fetch_add(1, Ordering::SeqCst) + 1;
    let completed = json!({
        "id": id,
        "status": "COMPLETED",
        "output": { "full_body": state.output, "seed": 7 }
    });
    let body = match state.behavior {
        MockBehavior::NeverFinishes => json!({ "id": id, "status": "IN_PROGRESS" }),
        MockBehavior::Completes => completed,
        MockBehavior::Fails => json!({ "id": id, "status": "FAILED", "error": "CUDA out of memory" }),
        MockBehavior::Stalls => {
            tokio::time::sleep(Duration::from_secs(10)).await;
            json!({ "id": id, "status": "IN_PROGRESS" })
        }
        MockBehavior::ErrorsThenCompletes(failures) if n <= failures => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "worker unavailable" })),
            );
        }
        MockBehavior::ErrorsThenCompletes(_) => completed,
    };
    (StatusCode::OK, Json(body))
}

async fn cancel(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> Json<Value> {
    state.cancellations.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "id": id, "status": "CANCELLED" }))
}

/// [`FileStore`] backed by a map of object key to contents.
#[derive(Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<String, (StoredFile, Vec<u8>)>>,
    list_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a file directly, bypassing [`FileStore::upload`].
    pub fn insert(&self, folder: &str, name: &str, bytes: Vec<u8>) -> String {
        let id = format!("{folder}/{name}");
        let file = StoredFile {
            id: id.clone(),
            name: name.to_string(),
            mime_type: mime_for(name).to_string(),
            size: Some(bytes.len() as u64),
            modified: None,
        };
        self.files.lock().unwrap().insert(id.clone(), (file, bytes));
        id
    }

    pub fn names_in(&self, folder: &str) -> Vec<String> {
        let prefix = format!("{folder}/");
        self.files
            .lock()
            .unwrap()
            .values()
            .filter(|(f, _)| f.id.starts_with(&prefix))
            .map(|(f, _)| f.name.clone())
            .collect()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

fn mime_for(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".pdf") {
        "application/pdf"
    } else {
        "application/octet-stream"
    }
}

#[async_trait]
impl FileStore for MemoryStore {
    async fn list(&self, folder: &str) -> Result<Vec<StoredFile>, StorageError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let prefix = format!("{folder}/");
        Ok(self
            .files
            .lock()
            .unwrap()
            .values()
            .filter(|(f, _)| f.id.starts_with(&prefix))
            .map(|(f, _)| f.clone())
            .collect())
    }

    async fn download(&self, id: &str) -> Result<Vec<u8>, StorageError> {
        self.files
            .lock()
            .unwrap()
            .get(id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| StorageError::Config(format!("No such file: {id}")))
    }

    async fn upload(
        &self,
        bytes: Vec<u8>,
        folder: &str,
        name: &str,
        content_type: &str,
    ) -> Result<StoredFile, StorageError> {
        let id = self.insert(folder, name, bytes);
        let mut files = self.files.lock().unwrap();
        let entry = files.get_mut(&id).unwrap();
        entry.0.mime_type = content_type.to_string();
        Ok(entry.0.clone())
    }

    fn link(&self, id: &str) -> String {
        format!("memory://{id}")
    }
}
