//! Persistence and transport primitives: batch loader, run audit log,
//! coordination service client, ingestion metrics, retrying HTTP client.

pub mod coord;
pub mod error;
pub mod http;
pub mod loader;
pub mod metrics;
pub mod runlog;
pub mod session;

pub use coord::{Coordinator, LeaseToken, MemoryCoordinator, RedisCoordinator};
pub use error::StoreError;
pub use http::{classify_status, BackoffPolicy, FetchError, HttpClient, HttpClientConfig, RetryDisposition};
pub use loader::{BatchLoader, MemoryLoader, PgLoader};
pub use metrics::IngestionMetrics;
pub use runlog::{MemoryRunLog, PgRunLog, RunLog};
pub use session::{IngestStore, MemoryStore, PgStore, StoreSession};

pub const CRATE_NAME: &str = "tradewinds-store";
