//! Spec-crawl work queue entities
//!
//! Each row is one spec-detail page. Rows are created `pending` during
//! discovery and move exactly once per processing attempt to a terminal
//! status; `failed` rows re-enter a batch only when the operator asks for a
//! retry run.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a queue row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Success,
    Failed,
    Skipped,
}

impl QueueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Success => "success",
            QueueStatus::Failed => "failed",
            QueueStatus::Skipped => "skipped",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(QueueStatus::Pending),
            "success" => Some(QueueStatus::Success),
            "failed" => Some(QueueStatus::Failed),
            "skipped" => Some(QueueStatus::Skipped),
            _ => None,
        }
    }

    /// Terminal states are never revisited automatically; only `failed`
    /// is eligible for an operator-requested retry.
    pub fn is_terminal(self) -> bool {
        !matches!(self, QueueStatus::Pending)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted crawl unit for a spec-detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecQueueRow {
    pub id: String,
    /// Unique within the queue; discovery upserts by this key.
    pub url: String,
    #[serde(rename = "externalGpuId")]
    pub external_gpu_id: Option<String>,
    #[serde(rename = "gpuName")]
    pub gpu_name: Option<String>,
    pub status: QueueStatus,
    #[serde(rename = "attemptCount")]
    pub attempt_count: i64,
    #[serde(rename = "lastError")]
    pub last_error: Option<String>,
    #[serde(rename = "lastAttemptAt")]
    pub last_attempt_at: Option<String>,
    #[serde(rename = "completedAt")]
    pub completed_at: Option<String>,
    #[serde(rename = "payloadJson")]
    pub payload_json: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}
