//! Registry-driven adapter construction. Adapter and transform references
//! resolve through closed lookup tables; unknown references fail here, at
//! construction time, never at run time.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use tradewinds_core::{BackfillWindow, Cursor, DatasetConfig, RawItem, Row};
use tradewinds_store::{FetchError, HttpClientConfig};

use crate::transforms::logistics::VesselTracker;
use crate::transforms::{self, BatchTransform};
use crate::{
    AdapterError, AisStreamAdapter, FileScraperAdapter, RestJsonAdapter, RssAdapter,
    SourceAdapter, StaticRecordAdapter,
};

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("dataset {dataset}: unknown adapter reference {adapter:?}")]
    UnknownAdapter { dataset: String, adapter: String },
    #[error("dataset {dataset}: unknown transform reference {transform:?}")]
    UnknownTransform { dataset: String, transform: String },
    #[error("dataset {dataset}: adapter argument {arg:?} is required")]
    MissingArg { dataset: String, arg: &'static str },
    #[error(transparent)]
    Http(#[from] FetchError),
}

fn require_arg<'a>(
    dataset: &str,
    cfg: &'a DatasetConfig,
    arg: &'static str,
) -> Result<&'a str, FactoryError> {
    cfg.arg_str(arg).ok_or_else(|| FactoryError::MissingArg {
        dataset: dataset.to_string(),
        arg,
    })
}

fn http_config(cfg: &DatasetConfig) -> HttpClientConfig {
    let mut config = HttpClientConfig::default();
    if let Some(timeout) = cfg.arg_u64("timeout_secs") {
        config.timeout = Duration::from_secs(timeout);
    }
    if let Some(user_agent) = cfg.arg_str("user_agent") {
        config.user_agent = Some(user_agent.to_string());
    }
    config
}

fn static_records(cfg: &DatasetConfig) -> Vec<RawItem> {
    cfg.args
        .get("records")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

/// Build the configured adapter for one registry entry, wrapping its
/// transform when the entry overrides it.
pub fn build_adapter(
    dataset_id: &str,
    cfg: &DatasetConfig,
) -> Result<Box<dyn SourceAdapter>, FactoryError> {
    let adapter: Box<dyn SourceAdapter> = match cfg.adapter.as_str() {
        "static" => Box::new(StaticRecordAdapter::new(dataset_id, static_records(cfg))),
        "rest_json" => {
            let base_url = require_arg(dataset_id, cfg, "base_url")?;
            let path = cfg.arg_str("path").unwrap_or_default();
            Box::new(RestJsonAdapter::new(
                dataset_id,
                base_url,
                path,
                http_config(cfg),
            )?)
        }
        "rss" => {
            let url = require_arg(dataset_id, cfg, "url")?;
            Box::new(RssAdapter::new(dataset_id, url, http_config(cfg))?)
        }
        "file_scraper" => {
            let url = require_arg(dataset_id, cfg, "url")?;
            Box::new(FileScraperAdapter::new(dataset_id, url, http_config(cfg))?)
        }
        "aisstream" => Box::new(AisStreamAdapter::new(
            dataset_id,
            static_records(cfg),
            VesselTracker::in_memory(),
        )),
        other => {
            return Err(FactoryError::UnknownAdapter {
                dataset: dataset_id.to_string(),
                adapter: other.to_string(),
            })
        }
    };

    match &cfg.transform {
        None => Ok(adapter),
        Some(name) => {
            let transform = transforms::lookup(name).ok_or_else(|| {
                FactoryError::UnknownTransform {
                    dataset: dataset_id.to_string(),
                    transform: name.clone(),
                }
            })?;
            Ok(Box::new(TransformOverride::new(adapter, transform)))
        }
    }
}

/// Bridges a batch-oriented transform to the adapter's single-item contract:
/// each raw item is presented to the override as a one-element batch. Fetch,
/// naming, and windowing delegate to the wrapped adapter.
pub struct TransformOverride {
    inner: Box<dyn SourceAdapter>,
    transform: BatchTransform,
}

impl TransformOverride {
    pub fn new(inner: Box<dyn SourceAdapter>, transform: BatchTransform) -> Self {
        Self { inner, transform }
    }
}

#[async_trait]
impl SourceAdapter for TransformOverride {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch(&mut self, cursor: Option<&Cursor>) -> Result<Vec<RawItem>, AdapterError> {
        self.inner.fetch(cursor).await
    }

    fn transform(&mut self, item: &RawItem) -> Vec<Row> {
        (self.transform)(std::slice::from_ref(item))
    }

    fn set_window(&mut self, window: BackfillWindow) {
        self.inner.set_window(window);
    }
}
