//! Core data model for the tradewinds ingestion pipeline.

pub mod dataset;
pub mod row;
pub mod run;

pub use dataset::{BackfillWindow, Cadence, Cursor, DatasetConfig, DatasetRegistry, RegistryError};
pub use row::{Row, Value};
pub use run::{IngestionRun, RunStatus};

pub const CRATE_NAME: &str = "tradewinds-core";

/// Raw item as pulled from an external source, before any transform runs.
pub type RawItem = serde_json::Value;
