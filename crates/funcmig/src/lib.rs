//! Functional migration runner.
//!
//! Callers register named, directional, zero-argument fallible operations
//! following the `Migration_<unixSeconds>_<up|down>` convention. The
//! engine orders them deterministically, decides which subsequence a
//! command implies against the recorded history, executes the operations
//! synchronously, and appends every attempt to a durable run log so
//! re-invocation is safe and idempotent.
//!
//! # Example
//!
//! ```
//! use funcmig::{MemoryStore, MigrationProvider, Migrator, OperationSet};
//! use std::path::PathBuf;
//!
//! struct AppMigrations;
//!
//! impl MigrationProvider for AppMigrations {
//!     fn operations(&self) -> OperationSet {
//!         OperationSet::new()
//!             .register("Migration_1658164360_up", || Ok(()))
//!             .register("Migration_1658164360_down", || Ok(()))
//!     }
//!
//!     fn migrations_path(&self) -> PathBuf {
//!         PathBuf::from("migrations")
//!     }
//!
//!     fn package_name(&self) -> String {
//!         "app_migrations".to_string()
//!     }
//! }
//!
//! let migrator = Migrator::new(MemoryStore::new(), AppMigrations)?;
//! migrator.latest()?;
//! # Ok::<(), funcmig::Error>(())
//! ```

pub mod error;
pub mod migration;
pub mod migrator;
pub mod registry;
pub mod status;
pub mod store;

pub use error::Error;
pub use migration::{
    canonical_name, file_name_timestamp, parse_name, Direction, MigrationDef, MigrationSequence,
    RunRecord, RunStatus, MIGRATION_PREFIX,
};
pub use migrator::{Migrator, MigratorConfig, WriteFileFn};
pub use registry::{MigrationProvider, OperationFn, OperationSet};
pub use status::{RunSummary, StatusEntry, StatusReport};
pub use store::memory::MemoryStore;
pub use store::{RunStore, StoreError};
