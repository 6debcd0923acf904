//! Per-migration run history reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::migration::{MigrationDef, RunStatus};

/// One recorded attempt of a migration, in compact report form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Wall-clock time of the attempt.
    pub timestamp: DateTime<Utc>,
    /// Outcome of the attempt.
    pub status: RunStatus,
}

/// Run history for one up migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEntry {
    /// The definition the runs belong to.
    pub migration: MigrationDef,
    /// Every recorded attempt, oldest first. Empty when never run.
    pub runs: Vec<RunSummary>,
}

/// Run history joined across the whole up sequence, in sequence order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    /// One entry per up migration definition.
    pub migrations: Vec<StatusEntry>,
}
