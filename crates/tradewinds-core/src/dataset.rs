//! Dataset registry data model: cadences, per-dataset config, cursors.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Re-run interval class for a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cadence {
    #[serde(rename = "15m")]
    QuarterHourly,
    #[serde(rename = "hourly")]
    Hourly,
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "monthly")]
    Monthly,
}

impl Cadence {
    pub fn interval(&self) -> Duration {
        match self {
            Cadence::QuarterHourly => Duration::from_secs(900),
            Cadence::Hourly => Duration::from_secs(3600),
            Cadence::Daily => Duration::from_secs(86_400),
            Cadence::Monthly => Duration::from_secs(30 * 86_400),
        }
    }
}

/// One registry entry. Extra YAML keys become adapter constructor arguments.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    pub name: String,
    pub cadence: Cadence,
    pub adapter: String,
    #[serde(default)]
    pub transform: Option<String>,
    pub target_table: String,
    pub conflict_keys: Vec<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(flatten)]
    pub args: BTreeMap<String, JsonValue>,
}

impl DatasetConfig {
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(JsonValue::as_str)
    }

    pub fn arg_u64(&self, key: &str) -> Option<u64> {
        self.args.get(key).and_then(JsonValue::as_u64)
    }
}

/// Declarative catalog of datasets, loaded once at process start.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatasetRegistry {
    #[serde(default)]
    pub datasets: BTreeMap<String, DatasetConfig>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("dataset {0}: target_table must not be empty")]
    EmptyTargetTable(String),
    #[error("dataset {0}: conflict_keys must not be empty")]
    EmptyConflictKeys(String),
}

impl DatasetRegistry {
    /// Enabled datasets in stable id order.
    pub fn enabled(&self) -> impl Iterator<Item = (&String, &DatasetConfig)> {
        self.datasets.iter().filter(|(_, cfg)| cfg.enabled)
    }

    pub fn get(&self, dataset_id: &str) -> Option<&DatasetConfig> {
        self.datasets.get(dataset_id)
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        for (id, cfg) in &self.datasets {
            if cfg.target_table.trim().is_empty() {
                return Err(RegistryError::EmptyTargetTable(id.clone()));
            }
            if cfg.conflict_keys.is_empty() {
                return Err(RegistryError::EmptyConflictKeys(id.clone()));
            }
        }
        Ok(())
    }
}

/// Opaque resume marker passed to `fetch`; meaning is adapter-specific.
#[derive(Debug, Clone, PartialEq)]
pub enum Cursor {
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl Cursor {
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Cursor::Timestamp(ts) => Some(*ts),
            Cursor::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cursor::Text(s) => Some(s),
            Cursor::Timestamp(_) => None,
        }
    }
}

/// Inclusive historical window attached to an adapter before a backfill run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackfillWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}
