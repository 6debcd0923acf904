//! Durable run-log contract.
//!
//! The engine records every execution attempt through a [`RunStore`] and
//! reads history back through its point queries. "No matching row" is
//! `Ok(None)` (or an empty list), never an error; a [`StoreError`] always
//! means the backend itself failed and is fatal to the engine.

pub mod memory;

use thiserror::Error;

use crate::migration::{RunRecord, RunStatus};

/// Error returned by a run-store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing storage failed.
    #[error("storage error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A persisted record could not be decoded.
    #[error("corrupt run record: {0}")]
    Corrupt(String),
}

/// Durable, append-only log of migration execution attempts.
pub trait RunStore {
    /// Idempotently create the underlying storage. Safe to call on every
    /// process start.
    fn create_store(&self) -> Result<(), StoreError>;

    /// Destructively reset the log. Test and maintenance use only.
    fn clear_store(&self) -> Result<(), StoreError>;

    /// The most recent run overall.
    fn last_run(&self) -> Result<Option<RunRecord>, StoreError>;

    /// The most recent run with the given status.
    fn last_run_with_status(&self, status: RunStatus) -> Result<Option<RunRecord>, StoreError>;

    /// The most recent run of the exact name.
    fn last_run_by_name(&self, name: &str) -> Result<Option<RunRecord>, StoreError>;

    /// Every run of the exact name, in insertion order.
    fn all_runs_by_name(&self, name: &str) -> Result<Vec<RunRecord>, StoreError>;

    /// Every run, in insertion order.
    fn list(&self) -> Result<Vec<RunRecord>, StoreError>;

    /// Append one record, assigning its `id`. When `attempt_error` is
    /// set the persisted status must be [`RunStatus::Failure`] with the
    /// error text taken from it.
    fn save(&self, record: &RunRecord, attempt_error: Option<&str>) -> Result<(), StoreError>;
}
