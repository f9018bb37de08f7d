//! Store session: one pooled connection checked out for the duration of a
//! single dataset run, shared by the loader and the audit log, released
//! unconditionally when the session drops.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::loader::{BatchLoader, MemoryLoader, PgLoader};
use crate::runlog::{MemoryRunLog, PgRunLog, RunLog};

/// Evidence density: count of recent linked mentions per factor. Recomputed
/// after every `news_mentions` ingestion.
const DENSITY_SQL: &str = "\
WITH counts AS (
    SELECT factor_id, COUNT(*)::float AS cnt
    FROM news_mentions
    WHERE factor_id IS NOT NULL
      AND published_at >= NOW() - INTERVAL '90 days'
    GROUP BY factor_id
)
UPDATE factors f
SET evidence_density = c.cnt
FROM counts c
WHERE f.factor_id = c.factor_id";

#[async_trait]
pub trait StoreSession: Send + Sync {
    fn loader(&self) -> &dyn BatchLoader;
    fn runs(&self) -> &dyn RunLog;
    async fn refresh_evidence_density(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait IngestStore: Send + Sync {
    async fn session(&self) -> Result<Box<dyn StoreSession>, StoreError>;
    async fn ping(&self) -> bool;
}

pub struct PgSession {
    conn: Arc<Mutex<PoolConnection<Postgres>>>,
    loader: PgLoader,
    runs: PgRunLog,
}

#[async_trait]
impl StoreSession for PgSession {
    fn loader(&self) -> &dyn BatchLoader {
        &self.loader
    }

    fn runs(&self) -> &dyn RunLog {
        &self.runs
    }

    async fn refresh_evidence_density(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        sqlx::query(DENSITY_SQL).execute(&mut **conn).await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl IngestStore for PgStore {
    async fn session(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        let conn = Arc::new(Mutex::new(self.pool.acquire().await?));
        Ok(Box::new(PgSession {
            loader: PgLoader::new(conn.clone()),
            runs: PgRunLog::new(conn.clone()),
            conn,
        }))
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

/// In-memory store whose sessions all share one loader and run log, so tests
/// can inspect what the pipeline persisted.
#[derive(Clone, Default)]
pub struct MemoryStore {
    loader: Arc<MemoryLoader>,
    runs: Arc<MemoryRunLog>,
    density_refreshes: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loader(&self) -> &MemoryLoader {
        &self.loader
    }

    pub fn run_log(&self) -> &MemoryRunLog {
        &self.runs
    }

    pub fn density_refreshes(&self) -> usize {
        self.density_refreshes.load(Ordering::SeqCst)
    }
}

struct MemorySession {
    loader: Arc<MemoryLoader>,
    runs: Arc<MemoryRunLog>,
    density_refreshes: Arc<AtomicUsize>,
}

#[async_trait]
impl StoreSession for MemorySession {
    fn loader(&self) -> &dyn BatchLoader {
        self.loader.as_ref()
    }

    fn runs(&self) -> &dyn RunLog {
        self.runs.as_ref()
    }

    async fn refresh_evidence_density(&self) -> Result<(), StoreError> {
        self.density_refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl IngestStore for MemoryStore {
    async fn session(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        Ok(Box::new(MemorySession {
            loader: self.loader.clone(),
            runs: self.runs.clone(),
            density_refreshes: self.density_refreshes.clone(),
        }))
    }

    async fn ping(&self) -> bool {
        true
    }
}
