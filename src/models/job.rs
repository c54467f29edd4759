use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// One unit of remote work: the workflow tree plus named binary attachments.
///
/// Consumed by value on submission; attachments are base64-encoded on the wire.
#[derive(Debug, Clone, Default)]
pub struct JobDescriptor {
    pub workflow: serde_json::Value,
    pub attachments: BTreeMap<String, Vec<u8>>,
}

impl JobDescriptor {
    pub fn new(workflow: serde_json::Value) -> Self {
        Self {
            workflow,
            attachments: BTreeMap::new(),
        }
    }

    pub fn with_attachment(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.attachments.insert(name.into(), bytes);
        self
    }
}

/// Identifier assigned by the compute endpoint when it accepts a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(pub String);

impl JobHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a remote job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Accepted,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::TimedOut | JobState::Cancelled
        )
    }

    /// Map a remote status string onto a state. Unknown strings are non-terminal.
    pub fn from_remote(status: &str) -> Self {
        match status {
            "IN_QUEUE" => JobState::Accepted,
            "COMPLETED" => JobState::Succeeded,
            "FAILED" => JobState::Failed,
            "CANCELLED" => JobState::Cancelled,
            "TIMED_OUT" => JobState::TimedOut,
            _ => JobState::Running,
        }
    }
}

/// Observed result of a job. Built once per observation and never mutated.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub handle: Option<JobHandle>,
    pub state: JobState,
    pub outputs: BTreeMap<String, Vec<u8>>,
    pub error: Option<String>,
    pub elapsed: Option<Duration>,
}

impl JobOutcome {
    pub fn accepted(handle: JobHandle) -> Self {
        Self {
            handle: Some(handle),
            state: JobState::Accepted,
            outputs: BTreeMap::new(),
            error: None,
            elapsed: None,
        }
    }

    /// A failure that happened before the endpoint assigned a handle.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            handle: None,
            state: JobState::Failed,
            outputs: BTreeMap::new(),
            error: Some(error.into()),
            elapsed: None,
        }
    }

    pub fn failed(handle: JobHandle, error: impl Into<String>) -> Self {
        Self {
            handle: Some(handle),
            state: JobState::Failed,
            outputs: BTreeMap::new(),
            error: Some(error.into()),
            elapsed: None,
        }
    }

    pub fn timed_out(handle: JobHandle, timeout: Duration) -> Self {
        Self {
            handle: Some(handle),
            state: JobState::TimedOut,
            outputs: BTreeMap::new(),
            error: Some(format!("Job timed out after {} seconds", timeout.as_secs())),
            elapsed: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    pub fn is_success(&self) -> bool {
        self.state == JobState::Succeeded
    }

    pub fn output(&self, name: &str) -> Option<&[u8]> {
        self.outputs.get(name).map(Vec::as_slice)
    }

    /// Human-readable failure reason, falling back to the state name.
    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| format!("Job ended in state {:?}", self.state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Accepted.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::TimedOut.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
    }

    #[test]
    fn test_remote_status_mapping() {
        assert_eq!(JobState::from_remote("IN_QUEUE"), JobState::Accepted);
        assert_eq!(JobState::from_remote("IN_PROGRESS"), JobState::Running);
        assert_eq!(JobState::from_remote("COMPLETED"), JobState::Succeeded);
        assert_eq!(JobState::from_remote("FAILED"), JobState::Failed);
        assert_eq!(JobState::from_remote("CANCELLED"), JobState::Cancelled);
        assert_eq!(JobState::from_remote("SOMETHING_NEW"), JobState::Running);
    }

    #[test]
    fn test_timed_out_is_distinguishable() {
        let outcome = JobOutcome::timed_out(JobHandle("abc".into()), Duration::from_secs(300));
        assert_eq!(outcome.state, JobState::TimedOut);
        assert!(outcome.error_message().contains("timed out after 300 seconds"));
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_rejected_has_no_handle() {
        let outcome = JobOutcome::rejected("connection refused");
        assert!(outcome.handle.is_none());
        assert_eq!(outcome.state, JobState::Failed);
    }
}
