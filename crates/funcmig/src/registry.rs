//! Operation registration and the owner contract.
//!
//! Migrations reach the engine as an explicit name to callable map built
//! once at discovery time; invocation is a direct call through that map.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// A zero-argument, error-returning migration operation.
pub type OperationFn =
    Box<dyn Fn() -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send + Sync>;

/// Ordered name to operation map supplied by a [`MigrationProvider`].
///
/// Names that do not follow the migration naming convention may coexist
/// here; discovery skips them without error.
#[derive(Default)]
pub struct OperationSet {
    ops: BTreeMap<String, OperationFn>,
}

impl OperationSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `op` under `name`, replacing any previous registration.
    pub fn register<F>(mut self, name: impl Into<String>, op: F) -> Self
    where
        F: Fn() -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send + Sync + 'static,
    {
        self.ops.insert(name.into(), Box::new(op));
        self
    }

    /// Number of registered operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if no operations are registered.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Iterate registered names in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ops.keys().map(String::as_str)
    }

    pub(crate) fn into_inner(self) -> BTreeMap<String, OperationFn> {
        self.ops
    }
}

impl std::fmt::Debug for OperationSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationSet")
            .field("names", &self.ops.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Contract implemented by the owner of a migration set.
pub trait MigrationProvider {
    /// The operations this owner exposes, keyed by operation name.
    /// Called exactly once, during discovery.
    fn operations(&self) -> OperationSet;

    /// Directory that generated migration templates are written to.
    fn migrations_path(&self) -> PathBuf;

    /// Module label stamped into generated templates.
    fn package_name(&self) -> String;
}
