//! Engine error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the migration engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A name fails the `Migration_<timestamp>_<up|down>` convention, or
    /// no operation is registered under it. Such names are skipped
    /// silently during discovery but are fatal for explicit run requests.
    #[error("invalid migration name {name:?}: expected a registered Migration_<timestamp>_<up|down> operation")]
    InvalidName {
        /// The offending name.
        name: String,
    },

    /// A migration operation returned an error. The failure record is
    /// persisted before this propagates.
    #[error("migration {name} failed: {source}")]
    Operation {
        /// Name of the failed migration.
        name: String,
        /// The operation's own error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The run store failed. Always fatal, never retried.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A generated migration template could not be written.
    #[error("failed to write migration template {path:?}: {source}")]
    TemplateWrite {
        /// Destination path of the template.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}
