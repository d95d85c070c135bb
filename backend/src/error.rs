//! Error types shared by the stores and the SLA engine.
//!
//! Each layer has its own `thiserror` enum; the scheduler's `JobError` lives in
//! `jobs::scheduler` and the lock error in `jobs::lock`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
