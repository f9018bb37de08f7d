//! Ingestion-run audit record, one row per adapter execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }
}

/// Append-only audit entry. Opened at run start, closed exactly once at run
/// end; a dangling `running` row only survives a process crash.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionRun {
    pub run_id: Uuid,
    pub dataset_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub rows_ingested: i64,
    pub error: Option<String>,
}

impl IngestionRun {
    pub fn open(dataset_id: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            dataset_id: dataset_id.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            status: RunStatus::Running,
            rows_ingested: 0,
            error: None,
        }
    }
}
