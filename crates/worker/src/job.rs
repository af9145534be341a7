use extract::PipelineResult;
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    /// Payload is not JSON or lacks a required field. Never retried.
    #[error("Malformed work item: {0}")]
    MalformedPayload(String),

    /// Outcome could not be handed to the results queue.
    #[error("Failed to publish outcome: {0}")]
    Publish(String),
}

/// One scene-analysis request, as delivered by the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub job_id: String,
    pub scene_text: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl WorkItem {
    pub fn parse(payload: &[u8]) -> Result<Self, WorkerError> {
        serde_json::from_slice(payload).map_err(|e| WorkerError::MalformedPayload(e.to_string()))
    }
}

/// Job lifecycle. Only the terminal states are ever published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Received,
    Processing,
    Completed,
    Failed,
}

/// Published once per valid delivery.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job_id: String,
    pub status: JobStatus,
    pub result: Option<PipelineResult>,
    pub error: Option<String>,
    #[serde(rename = "processing_time", serialize_with = "serialize_seconds")]
    pub elapsed: Duration,
}

impl JobOutcome {
    pub fn completed(job_id: String, result: PipelineResult, elapsed: Duration) -> Self {
        Self {
            job_id,
            status: JobStatus::Completed,
            result: Some(result),
            error: None,
            elapsed,
        }
    }

    pub fn failed(job_id: String, error: String, elapsed: Duration) -> Self {
        Self {
            job_id,
            status: JobStatus::Failed,
            result: None,
            error: Some(error),
            elapsed,
        }
    }
}

fn serialize_seconds<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:.2}s", elapsed.as_secs_f64()))
}
