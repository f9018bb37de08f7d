//! Append-only `ingestion_runs` audit trail.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::pool::PoolConnection;
use sqlx::Postgres;
use tokio::sync::Mutex;
use uuid::Uuid;

use tradewinds_core::{IngestionRun, RunStatus};

use crate::error::StoreError;

#[async_trait]
pub trait RunLog: Send + Sync {
    /// Insert a `running` audit row and return its id.
    async fn open(&self, dataset_id: &str) -> Result<Uuid, StoreError>;

    /// Close the audit row exactly once, on success and failure alike.
    async fn close(
        &self,
        run_id: Uuid,
        status: RunStatus,
        rows_ingested: i64,
        error: Option<&str>,
    ) -> Result<(), StoreError>;
}

pub struct PgRunLog {
    conn: Arc<Mutex<PoolConnection<Postgres>>>,
}

impl PgRunLog {
    pub fn new(conn: Arc<Mutex<PoolConnection<Postgres>>>) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RunLog for PgRunLog {
    async fn open(&self, dataset_id: &str) -> Result<Uuid, StoreError> {
        let run_id = Uuid::new_v4();
        let mut conn = self.conn.lock().await;
        sqlx::query(
            "INSERT INTO ingestion_runs (run_id, dataset_id, started_at, status) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(run_id)
        .bind(dataset_id)
        .bind(Utc::now())
        .bind(RunStatus::Running.as_str())
        .execute(&mut **conn)
        .await?;
        Ok(run_id)
    }

    async fn close(
        &self,
        run_id: Uuid,
        status: RunStatus,
        rows_ingested: i64,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        let done = sqlx::query(
            "UPDATE ingestion_runs \
             SET ended_at=$1, status=$2, rows_ingested=$3, error=$4 \
             WHERE run_id=$5",
        )
        .bind(Utc::now())
        .bind(status.as_str())
        .bind(rows_ingested)
        .bind(error)
        .bind(run_id)
        .execute(&mut **conn)
        .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::UnknownRun(run_id));
        }
        Ok(())
    }
}

/// In-memory audit trail for tests.
#[derive(Default)]
pub struct MemoryRunLog {
    runs: Mutex<Vec<IngestionRun>>,
}

impl MemoryRunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn runs(&self) -> Vec<IngestionRun> {
        self.runs.lock().await.clone()
    }
}

#[async_trait]
impl RunLog for MemoryRunLog {
    async fn open(&self, dataset_id: &str) -> Result<Uuid, StoreError> {
        let run = IngestionRun::open(dataset_id);
        let run_id = run.run_id;
        self.runs.lock().await.push(run);
        Ok(run_id)
    }

    async fn close(
        &self,
        run_id: Uuid,
        status: RunStatus,
        rows_ingested: i64,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut runs = self.runs.lock().await;
        let run = runs
            .iter_mut()
            .find(|r| r.run_id == run_id)
            .ok_or(StoreError::UnknownRun(run_id))?;
        run.ended_at = Some(Utc::now());
        run.status = status;
        run.rows_ingested = rows_ingested;
        run.error = error.map(str::to_string);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_then_close_records_the_full_lifecycle() {
        let log = MemoryRunLog::new();
        let run_id = log.open("rates.fred.us10y").await.unwrap();

        let runs = log.runs().await;
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Running);

        log.close(run_id, RunStatus::Success, 42, None).await.unwrap();
        let runs = log.runs().await;
        assert_eq!(runs[0].status, RunStatus::Success);
        assert_eq!(runs[0].rows_ingested, 42);
        assert!(runs[0].ended_at.is_some());
    }

    #[tokio::test]
    async fn closing_an_unknown_run_errors() {
        let log = MemoryRunLog::new();
        let err = log
            .close(Uuid::new_v4(), RunStatus::Failed, 0, Some("boom"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownRun(_)));
    }
}
