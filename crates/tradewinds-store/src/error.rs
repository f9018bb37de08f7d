use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid sql identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("conflict key {0:?} missing from row shape")]
    MissingConflictKey(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
    #[error("run {0} was never opened")]
    UnknownRun(Uuid),
}
