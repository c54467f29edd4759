use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::ComputeSettings;
use crate::models::job::{JobDescriptor, JobHandle, JobOutcome, JobState};

/// Per-request transport timeout; the job-level bound is enforced separately.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for a RunPod serverless endpoint running the try-on workflow.
///
/// Submission, status and cancellation never return transport errors to the
/// caller: they are folded into a [`JobOutcome`] so that one garment's
/// failure can be recorded without unwinding the batch.
#[derive(Debug, Clone)]
pub struct RunpodClient {
    http: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
    poll_interval: Duration,
}

#[derive(Deserialize)]
struct RunResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl RunpodClient {
    pub fn new(base_url: &str, endpoint_id: &str, api_key: &str) -> Result<Self, ComputeError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ComputeError::Network {
                context: "Failed to create HTTP client".into(),
                source: e,
            })?;

        Ok(Self {
            http,
            base_url: format!("{}/{}", base_url.trim_end_matches('/'), endpoint_id),
            api_key: api_key.to_string(),
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(5),
        })
    }

    pub fn from_settings(settings: &ComputeSettings) -> Result<Self, ComputeError> {
        Ok(Self::new(&settings.base_url, &settings.endpoint_id, &settings.api_key)?
            .with_timing(settings.timeout_secs, settings.poll_interval_secs))
    }

    /// Set the job timeout and poll interval, both in whole seconds.
    pub fn with_timing(mut self, timeout_secs: u64, poll_interval_secs: u64) -> Self {
        self.timeout = Duration::from_secs(timeout_secs);
        self.poll_interval = Duration::from_secs(poll_interval_secs.max(1));
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Submit a job. With `wait_for_completion` the call only returns once the
    /// job is terminal (including a client-side `TimedOut`); otherwise it
    /// returns `Accepted` as soon as the endpoint has assigned a handle.
    pub async fn submit(&self, job: JobDescriptor, wait_for_completion: bool) -> JobOutcome {
        let started = Instant::now();
        metrics::counter!("compute_jobs_submitted_total").increment(1);

        let handle = match self.post_run(job).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "Job submission failed");
                metrics::counter!("compute_jobs_failed_total").increment(1);
                return JobOutcome::rejected(e.to_string()).with_elapsed(started.elapsed());
            }
        };

        tracing::info!(job_id = %handle, "Job submitted");

        if !wait_for_completion {
            return JobOutcome::accepted(handle);
        }

        let outcome = self.poll_until_terminal(handle, started).await;
        let elapsed = started.elapsed();
        metrics::histogram!("compute_job_duration_seconds").record(elapsed.as_secs_f64());
        match outcome.state {
            JobState::Succeeded => metrics::counter!("compute_jobs_completed_total").increment(1),
            JobState::TimedOut => metrics::counter!("compute_jobs_timed_out_total").increment(1),
            _ => metrics::counter!("compute_jobs_failed_total").increment(1),
        }
        outcome.with_elapsed(elapsed)
    }

    /// Single status check. Transport and endpoint errors come back as `Failed`.
    pub async fn get_status(&self, handle: &JobHandle) -> JobOutcome {
        match self.query_status(handle).await {
            Ok(status) => outcome_from_status(handle.clone(), status),
            Err(e) => JobOutcome::failed(handle.clone(), format!("Failed to get status: {e}")),
        }
    }

    /// Ask the endpoint to cancel a job. Best-effort; the job may still run.
    pub async fn cancel(&self, handle: &JobHandle) -> bool {
        let url = format!("{}/cancel/{}", self.base_url, handle);
        match self.http.post(&url).bearer_auth(&self.api_key).send().await {
            Ok(resp) => {
                let accepted = resp.status().is_success();
                tracing::info!(job_id = %handle, accepted, "Cancel requested");
                accepted
            }
            Err(e) => {
                tracing::warn!(job_id = %handle, error = %e, "Cancel request failed");
                false
            }
        }
    }

    /// Sleep, check the deadline, query; repeat until terminal. Query errors
    /// are logged and retried: only the deadline ends a non-terminal job.
    /// Neither a sleep nor a status query may run past the deadline.
    async fn poll_until_terminal(&self, handle: JobHandle, started: Instant) -> JobOutcome {
        let deadline = started + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(self.poll_interval.min(remaining)).await;

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return self.timed_out(handle);
            }

            let status = match tokio::time::timeout(remaining, self.query_status(&handle)).await {
                Ok(Ok(status)) => status,
                Ok(Err(e)) => {
                    tracing::warn!(job_id = %handle, error = %e, "Status poll failed, retrying");
                    continue;
                }
                Err(_) => return self.timed_out(handle),
            };

            tracing::debug!(job_id = %handle, status = %status.status, "Job status");

            let outcome = outcome_from_status(handle.clone(), status);
            if outcome.state.is_terminal() {
                return outcome;
            }
        }
    }

    fn timed_out(&self, handle: JobHandle) -> JobOutcome {
        tracing::warn!(
            job_id = %handle,
            timeout_secs = self.timeout.as_secs(),
            "Job exceeded timeout"
        );
        JobOutcome::timed_out(handle, self.timeout)
    }

    async fn post_run(&self, job: JobDescriptor) -> Result<JobHandle, ComputeError> {
        let url = format!("{}/run", self.base_url);
        let payload = run_payload(job);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ComputeError::Network {
                context: format!("Cannot reach compute endpoint at {}", self.base_url),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ComputeError::Http { status, body });
        }

        let run: RunResponse = resp.json().await.map_err(|e| ComputeError::Network {
            context: "Failed to parse /run response".into(),
            source: e,
        })?;

        run.id
            .filter(|id| !id.is_empty())
            .map(JobHandle)
            .ok_or_else(|| ComputeError::InvalidResponse("Response missing job id".into()))
    }

    async fn query_status(&self, handle: &JobHandle) -> Result<StatusResponse, ComputeError> {
        let url = format!("{}/status/{}", self.base_url, handle);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ComputeError::Network {
                context: "Failed to fetch job status".into(),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ComputeError::Http { status, body });
        }

        resp.json().await.map_err(|e| ComputeError::Network {
            context: "Failed to parse job status".into(),
            source: e,
        })
    }
}

/// Wire body for `POST /run`. `images` is omitted when there are no attachments.
fn run_payload(job: JobDescriptor) -> Value {
    let mut input = Map::new();
    input.insert("workflow".into(), job.workflow);
    if !job.attachments.is_empty() {
        let images: Map<String, Value> = job
            .attachments
            .into_iter()
            .map(|(name, bytes)| {
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                (name, Value::String(encoded))
            })
            .collect();
        input.insert("images".into(), Value::Object(images));
    }
    json!({ "input": input })
}

fn outcome_from_status(handle: JobHandle, status: StatusResponse) -> JobOutcome {
    let state = JobState::from_remote(&status.status);
    let outputs = status.output.as_ref().map(decode_outputs).unwrap_or_default();
    let error = match state {
        JobState::Failed => Some(
            status
                .error
                .as_ref()
                .map(error_text)
                .unwrap_or_else(|| "Job failed without error message".to_string()),
        ),
        JobState::Cancelled => Some("Job was cancelled".to_string()),
        JobState::TimedOut => Some("Job timed out on the compute endpoint".to_string()),
        _ => status.error.as_ref().map(error_text),
    };

    JobOutcome {
        handle: Some(handle),
        state,
        outputs,
        error,
        elapsed: None,
    }
}

/// Decode the base64 string members of an `output` object into named images.
fn decode_outputs(output: &Value) -> BTreeMap<String, Vec<u8>> {
    let mut decoded = BTreeMap::new();
    let Some(members) = output.as_object() else {
        return decoded;
    };
    for (name, value) in members {
        let Some(text) = value.as_str() else {
            continue;
        };
        match base64::engine::general_purpose::STANDARD.decode(text) {
            Ok(bytes) => {
                decoded.insert(name.clone(), bytes);
            }
            Err(e) => tracing::warn!(output = %name, error = %e, "Skipping undecodable output"),
        }
    }
    decoded
}

fn error_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error("Compute endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("{0}")]
    InvalidResponse(String),

    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_joins_endpoint() {
        let client = RunpodClient::new("https://api.runpod.ai/v2/", "abc123", "key").unwrap();
        assert_eq!(client.base_url, "https://api.runpod.ai/v2/abc123");
    }

    #[test]
    fn test_timing_in_whole_seconds() {
        let client = RunpodClient::new("http://localhost", "ep", "key")
            .unwrap()
            .with_timing(120, 0);
        assert_eq!(client.timeout(), Duration::from_secs(120));
        assert_eq!(client.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_run_payload_with_images() {
        let job = JobDescriptor::new(json!({"type": "complete_pipeline"}))
            .with_attachment("garment", vec![1, 2, 3]);
        let payload = run_payload(job);
        assert_eq!(payload["input"]["workflow"]["type"], "complete_pipeline");
        assert_eq!(payload["input"]["images"]["garment"], "AQID");
    }

    #[test]
    fn test_run_payload_without_images() {
        let payload = run_payload(JobDescriptor::new(json!({})));
        assert!(payload["input"].get("images").is_none());
    }

    #[test]
    fn test_completed_status_decodes_outputs() {
        let status: StatusResponse = serde_json::from_str(
            r#"{"status": "COMPLETED", "output": {"full_body": "AQID", "seed": 42}}"#,
        )
        .unwrap();
        let outcome = outcome_from_status(JobHandle("j1".into()), status);
        assert!(outcome.is_success());
        assert_eq!(outcome.output("full_body"), Some(&[1u8, 2, 3][..]));
        assert!(outcome.output("seed").is_none());
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_failed_status_default_message() {
        let status: StatusResponse = serde_json::from_str(r#"{"status": "FAILED"}"#).unwrap();
        let outcome = outcome_from_status(JobHandle("j2".into()), status);
        assert_eq!(outcome.state, JobState::Failed);
        assert_eq!(outcome.error.as_deref(), Some("Job failed without error message"));
    }

    #[test]
    fn test_failed_status_structured_error() {
        let status: StatusResponse =
            serde_json::from_str(r#"{"status": "FAILED", "error": {"message": "OOM"}}"#).unwrap();
        let outcome = outcome_from_status(JobHandle("j3".into()), status);
        assert!(outcome.error_message().contains("OOM"));
    }

    #[test]
    fn test_in_progress_is_not_terminal() {
        let status: StatusResponse = serde_json::from_str(r#"{"status": "IN_PROGRESS"}"#).unwrap();
        let outcome = outcome_from_status(JobHandle("j4".into()), status);
        assert!(!outcome.state.is_terminal());
    }
}
