//! Leader-elected interval scheduler: one repeated async job per enabled
//! dataset, counters and latency observations around every run, and a
//! last-success cache driving delay metrics and health checks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use tradewinds_adapters::{build_adapter, RunContext};
use tradewinds_core::DatasetConfig;
use tradewinds_store::{Coordinator, LeaseToken};

use crate::{IngestDeps, IngestError};

pub const SCHEDULER_LOCK: &str = "scheduler_lock";

const NEWS_MENTIONS_TABLE: &str = "news_mentions";

pub(crate) fn last_success_key(dataset_id: &str) -> String {
    format!("ingest:{dataset_id}:ts")
}

pub(crate) async fn read_last_success(
    coord: &dyn Coordinator,
    dataset_id: &str,
) -> Option<DateTime<Utc>> {
    let cached = coord.get(&last_success_key(dataset_id)).await.ok()??;
    DateTime::parse_from_rfc3339(&cached)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// One tick of one dataset: delay observation, pooled session for the whole
/// run, factory, adapter run, post-steps, metrics, last-success cache. The
/// session (and with it the pooled handle) is released on every path.
pub async fn run_dataset_job(
    deps: &IngestDeps,
    dataset_id: &str,
    cfg: &DatasetConfig,
) -> Result<u64, IngestError> {
    let now = Utc::now();
    if let Some(prev) = read_last_success(deps.coord.as_ref(), dataset_id).await {
        let delay = (now - prev).num_milliseconds().max(0) as f64 / 1000.0;
        deps.metrics
            .delay
            .with_label_values(&[dataset_id])
            .observe(delay);
    }

    let started = Instant::now();
    let session = deps.store.session().await?;

    let result: Result<u64, IngestError> = async {
        let mut adapter = build_adapter(dataset_id, cfg)?;
        let ctx = RunContext {
            dataset_id,
            target_table: &cfg.target_table,
            conflict_keys: &cfg.conflict_keys,
            loader: session.loader(),
            runs: session.runs(),
        };
        let rows = adapter.run(&ctx, None).await?;
        if cfg.target_table == NEWS_MENTIONS_TABLE {
            session.refresh_evidence_density().await?;
        }
        Ok(rows)
    }
    .await;

    match result {
        Ok(rows) => {
            deps.metrics
                .success
                .with_label_values(&[dataset_id])
                .inc();
            deps.metrics
                .latency
                .with_label_values(&[dataset_id])
                .observe(started.elapsed().as_secs_f64());
            deps.coord
                .set_with_ttl(
                    &last_success_key(dataset_id),
                    &Utc::now().to_rfc3339(),
                    cfg.cadence.interval(),
                )
                .await?;
            Ok(rows)
        }
        Err(err) => {
            deps.metrics
                .failure
                .with_label_values(&[dataset_id])
                .inc();
            Err(err)
        }
    }
}

pub struct IngestScheduler {
    runner: Option<JobScheduler>,
    lease: Option<LeaseToken>,
    coord: Arc<dyn Coordinator>,
    job_count: usize,
}

impl IngestScheduler {
    pub fn is_leader(&self) -> bool {
        self.lease.is_some()
    }

    pub fn job_count(&self) -> usize {
        self.job_count
    }

    /// Stop the interval jobs and give up leadership.
    pub async fn shutdown(mut self) -> Result<(), IngestError> {
        if let Some(mut runner) = self.runner.take() {
            runner.shutdown().await?;
        }
        if let Some(lease) = self.lease.take() {
            self.coord.release(lease).await?;
        }
        Ok(())
    }
}

/// Contend for leadership and, on winning, start one interval job per
/// enabled dataset. Losers schedule nothing and stay idle; a restart is the
/// way to contend again.
pub async fn start_scheduler(
    deps: IngestDeps,
    lease: Duration,
) -> Result<IngestScheduler, IngestError> {
    let Some(lease_token) = deps.coord.try_acquire(SCHEDULER_LOCK, lease).await? else {
        info!("scheduler lock already held; this instance stays idle");
        return Ok(IngestScheduler {
            runner: None,
            lease: None,
            coord: deps.coord.clone(),
            job_count: 0,
        });
    };
    info!("scheduler lock acquired; starting dataset jobs");

    let runner = JobScheduler::new().await?;
    let mut job_count = 0usize;

    for (dataset_id, cfg) in deps.registry.enabled() {
        let interval = cfg.cadence.interval();
        let tick_guard = Arc::new(Mutex::new(()));
        let deps = deps.clone();
        let dataset_id = dataset_id.clone();
        let cfg = cfg.clone();

        let job = Job::new_repeated_async(interval, move |_job_id, _scheduler| {
            let deps = deps.clone();
            let dataset_id = dataset_id.clone();
            let cfg = cfg.clone();
            let tick_guard = tick_guard.clone();
            Box::pin(async move {
                // Consecutive ticks of the same dataset must not overlap.
                let Ok(_tick) = tick_guard.try_lock() else {
                    warn!(dataset_id = %dataset_id, "previous tick still running; skipping");
                    return;
                };
                match run_dataset_job(&deps, &dataset_id, &cfg).await {
                    Ok(rows) => info!(dataset_id = %dataset_id, rows, "ingestion run complete"),
                    Err(err) => {
                        // A single dataset's failure never stops the others.
                        error!(dataset_id = %dataset_id, error = %err, "ingestion run failed")
                    }
                }
            })
        })?;
        runner.add(job).await?;
        job_count += 1;
    }

    runner.start().await?;
    Ok(IngestScheduler {
        runner: Some(runner),
        lease: Some(lease_token),
        coord: deps.coord.clone(),
        job_count,
    })
}
