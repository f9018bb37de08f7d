//! Source adapter contracts, concrete adapter variants, domain transforms,
//! and the registry-driven adapter factory.

pub mod aisstream;
pub mod factory;
pub mod file_scraper;
pub mod rest_json;
pub mod rss;
pub mod static_records;
pub mod transforms;

pub use aisstream::AisStreamAdapter;
pub use factory::{build_adapter, FactoryError, TransformOverride};
pub use file_scraper::FileScraperAdapter;
pub use rest_json::RestJsonAdapter;
pub use rss::RssAdapter;
pub use static_records::StaticRecordAdapter;

use async_trait::async_trait;
use thiserror::Error;

use tradewinds_core::{BackfillWindow, Cursor, RawItem, Row, RunStatus};
use tradewinds_store::{BatchLoader, FetchError, RunLog, StoreError};

pub const CRATE_NAME: &str = "tradewinds-adapters";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("malformed source payload: {0}")]
    Malformed(String),
}

/// Everything one adapter execution needs from its caller: the audit log and
/// the loader bound to the run's pooled connection, plus the registry-driven
/// load target.
pub struct RunContext<'a> {
    pub dataset_id: &'a str,
    pub target_table: &'a str,
    pub conflict_keys: &'a [String],
    pub loader: &'a dyn BatchLoader,
    pub runs: &'a dyn RunLog,
}

#[async_trait]
pub trait SourceAdapter: Send {
    fn name(&self) -> &str;

    /// Raw items newer than `cursor`. What "newer" means is source-specific;
    /// each call returns a finite batch.
    async fn fetch(&mut self, cursor: Option<&Cursor>) -> Result<Vec<RawItem>, AdapterError>;

    /// Map one raw item to zero or more canonical rows. Unrecognized items
    /// yield an empty vec and are dropped without error.
    fn transform(&mut self, item: &RawItem) -> Vec<Row>;

    /// Inclusive historical window for backfills; ignored by adapters that
    /// cannot pull historical slices.
    fn set_window(&mut self, _window: BackfillWindow) {}

    /// One execution: open the audit run, fetch, transform and load item by
    /// item, then close the audit run. The close happens on the failure path
    /// too, before the error reaches the caller.
    async fn run(
        &mut self,
        ctx: &RunContext<'_>,
        cursor: Option<&Cursor>,
    ) -> Result<u64, AdapterError> {
        let run_id = ctx.runs.open(ctx.dataset_id).await?;
        let mut ingested: u64 = 0;

        let result = async {
            let items = self.fetch(cursor).await?;
            for item in items {
                let rows = self.transform(&item);
                if rows.is_empty() {
                    continue;
                }
                ingested += ctx
                    .loader
                    .upsert(ctx.target_table, &rows, ctx.conflict_keys)
                    .await?;
            }
            Ok::<(), AdapterError>(())
        }
        .await;

        match result {
            Ok(()) => {
                ctx.runs
                    .close(run_id, RunStatus::Success, ingested as i64, None)
                    .await?;
                Ok(ingested)
            }
            Err(err) => {
                ctx.runs
                    .close(run_id, RunStatus::Failed, ingested as i64, Some(&err.to_string()))
                    .await?;
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for dyn SourceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceAdapter")
            .field("name", &self.name())
            .finish()
    }
}
