//! The execution engine.
//!
//! Discovers registered migrations, decides which subsequence a command
//! implies against the recorded history, runs the operations in order,
//! and appends one run record per attempt. Also generates source
//! templates for new migration pairs.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::migration::{
    canonical_name, parse_name, Direction, MigrationSequence, RunRecord, RunStatus,
};
use crate::registry::{MigrationProvider, OperationFn};
use crate::status::{RunSummary, StatusEntry, StatusReport};
use crate::store::RunStore;

/// Writer used to persist generated migration templates.
pub type WriteFileFn = Box<dyn Fn(&Path, &[u8]) -> io::Result<()> + Send + Sync>;

/// Engine configuration. Defaults are applied by [`Default`], not by
/// mutating shared state.
pub struct MigratorConfig {
    /// Sink for generated migration templates.
    pub write_file: WriteFileFn,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            write_file: Box::new(|path, data| fs::write(path, data)),
        }
    }
}

impl fmt::Debug for MigratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigratorConfig").finish_non_exhaustive()
    }
}

/// The migration engine.
///
/// Owns the run store, the discovered sequences, and the name to
/// operation map. Execution is single-threaded and synchronous: each
/// operation runs to completion before the next starts, and the engine
/// takes no locks. Two processes sharing one log must serialize their
/// invocations externally (a deployment constraint, not an engine
/// guarantee).
pub struct Migrator<S, P> {
    store: S,
    provider: P,
    operations: BTreeMap<String, OperationFn>,
    up: MigrationSequence,
    down: MigrationSequence,
    config: MigratorConfig,
    seeded: bool,
}

impl<S: RunStore, P: MigrationProvider> Migrator<S, P> {
    /// Create an engine with default configuration and run discovery.
    pub fn new(store: S, provider: P) -> Result<Self, Error> {
        Self::with_config(store, provider, MigratorConfig::default())
    }

    /// Create an engine with explicit configuration and run discovery.
    pub fn with_config(store: S, provider: P, config: MigratorConfig) -> Result<Self, Error> {
        let mut migrator = Self {
            store,
            provider,
            operations: BTreeMap::new(),
            up: MigrationSequence::default(),
            down: MigrationSequence::default(),
            config,
            seeded: false,
        };

        migrator.seed()?;
        Ok(migrator)
    }

    /// Scan the provider's operations and build both sequences.
    ///
    /// Runs once per engine lifetime; repeated calls are no-ops. Names
    /// that do not parse as migrations are skipped, never an error.
    fn seed(&mut self) -> Result<(), Error> {
        if self.seeded {
            return Ok(());
        }

        for (name, op) in self.provider.operations().into_inner() {
            let (timestamp, direction) = match parse_name(&name) {
                Ok(parts) => parts,
                // Owners may expose arbitrary other operations.
                Err(_) => continue,
            };

            match direction {
                Direction::Up => self.up.push(name.as_str(), direction, timestamp),
                Direction::Down => self.down.push(name.as_str(), direction, timestamp),
            }
            self.operations.insert(name, op);
        }

        self.store.create_store()?;

        self.up.sort_ascending();
        self.down.sort_descending();
        self.seeded = true;

        debug!(
            up = self.up.len(),
            down = self.down.len(),
            "Discovered migrations"
        );

        Ok(())
    }

    /// The run store backing this engine.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The ascending up sequence.
    pub fn up_migrations(&self) -> &MigrationSequence {
        &self.up
    }

    /// The descending down sequence.
    pub fn down_migrations(&self) -> &MigrationSequence {
        &self.down
    }

    /// Execute the named migrations in order, recording one attempt each.
    ///
    /// Stops at the first failure: the failing attempt is persisted,
    /// then its error propagates; later names are not attempted.
    pub fn run<I, N>(&self, names: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        for name in names {
            self.run_one(name.as_ref())?;
        }
        Ok(())
    }

    fn run_one(&self, name: &str) -> Result<(), Error> {
        let (timestamp, direction) = parse_name(name)?;
        let op = self.operations.get(name).ok_or_else(|| Error::InvalidName {
            name: name.to_string(),
        })?;

        info!(name = %name, direction = %direction, "Running migration");

        let outcome = op();
        let mut record = RunRecord {
            id: 0,
            name: name.to_string(),
            direction,
            status: RunStatus::Success,
            error: String::new(),
            timestamp,
            created: Utc::now(),
        };

        match outcome {
            Ok(()) => {
                self.store.save(&record, None)?;
                Ok(())
            }
            Err(source) => {
                record.status = RunStatus::Failure;
                let detail = source.to_string();
                warn!(name = %name, error = %detail, "Migration failed");
                self.store.save(&record, Some(&detail))?;
                Err(Error::Operation {
                    name: name.to_string(),
                    source,
                })
            }
        }
    }

    /// Run every up migration newer than the resume point.
    ///
    /// The resume point is the last recorded run when it succeeded, or
    /// the last successful run when the log ends in a failure, so a
    /// failed migration is retried rather than skipped. A log ending in
    /// a down run replays the up sequence from the beginning.
    pub fn latest(&self) -> Result<(), Error> {
        let last_run = self.store.last_run()?;

        let resume = match last_run {
            None => None,
            Some(run) if run.status == RunStatus::Success => {
                let newest = match self.up.last() {
                    Some(def) => def,
                    None => return Ok(()),
                };

                if run.name == newest.name {
                    debug!(name = %run.name, "Already at the newest migration");
                    return Ok(());
                }

                if run.direction == newest.direction {
                    Some(run)
                } else {
                    // History ends in a down run; replay from the start.
                    None
                }
            }
            Some(_) => self.store.last_run_with_status(RunStatus::Success)?,
        };

        let to_run = self.up.after(resume.as_ref());
        self.run(to_run.iter().map(|def| def.name.as_str()))
    }

    /// Run every up migration from the beginning through `name`.
    ///
    /// `name` may be canonical, a bare timestamp, or missing the `_up`
    /// suffix. When the most recent run by the exact name succeeded the
    /// call is a successful no-op: nothing is invoked, nothing is
    /// appended.
    pub fn up(&self, name: &str) -> Result<(), Error> {
        let name = canonical_name(name, Direction::Up);

        if let Some(prior) = self.store.last_run_by_name(&name)? {
            if prior.status == RunStatus::Success {
                debug!(name = %name, "Migration already applied, skipping");
                return Ok(());
            }
        }

        let to_run = self.up.before_name(&name);
        self.run(to_run.iter().map(|def| def.name.as_str()))
    }

    /// Run every down migration from the most recent through `name`.
    ///
    /// Accepts the same name forms as [`Migrator::up`]. Down migrations
    /// carry no already-applied guard; they are assumed safe to repeat.
    pub fn down(&self, name: &str) -> Result<(), Error> {
        let name = canonical_name(name, Direction::Down);
        let to_run = self.down.before_name(&name);
        self.run(to_run.iter().map(|def| def.name.as_str()))
    }

    /// Join the up sequence with the run log into a per-migration
    /// history. Definitions that never ran appear with an empty run
    /// list.
    pub fn status(&self) -> Result<StatusReport, Error> {
        let mut migrations = Vec::with_capacity(self.up.len());

        for def in self.up.iter() {
            let runs = self.store.all_runs_by_name(&def.name)?;
            migrations.push(StatusEntry {
                migration: def.clone(),
                runs: runs
                    .into_iter()
                    .map(|run| RunSummary {
                        timestamp: run.created,
                        status: run.status,
                    })
                    .collect(),
            });
        }

        Ok(StatusReport { migrations })
    }

    /// Render the source skeleton for a new migration pair, stamped with
    /// the current unix time. Returns the rendered text and the stamp.
    pub fn next_migration_template(&self) -> (String, i64) {
        let now = Utc::now().timestamp();
        let package = self.provider.package_name();

        let template = format!(
            r#"//! Migration {ts} for `{pkg}`.
//!
//! Register both operations with the owner's operation set:
//!
//! ```ignore
//! OperationSet::new()
//!     .register("Migration_{ts}_up", migration_{ts}_up)
//!     .register("Migration_{ts}_down", migration_{ts}_down)
//! ```

use std::error::Error;

/// Apply migration {ts}.
pub fn migration_{ts}_up() -> Result<(), Box<dyn Error + Send + Sync>> {{
    // up migration here
    Ok(())
}}

/// Revert migration {ts}.
pub fn migration_{ts}_down() -> Result<(), Box<dyn Error + Send + Sync>> {{
    // down migration here
    Ok(())
}}
"#,
            ts = now,
            pkg = package,
        );

        (template, now)
    }

    /// Write a fresh migration template into the provider's migrations
    /// directory and return its path.
    pub fn create_migration(&self) -> Result<PathBuf, Error> {
        let (template, now) = self.next_migration_template();
        let file_name = format!("migration_{}.rs", now);
        let path = self.provider.migrations_path().join(file_name);

        (self.config.write_file)(&path, template.as_bytes()).map_err(|source| {
            Error::TemplateWrite {
                path: path.clone(),
                source,
            }
        })?;

        info!(path = %path.display(), "Created migration template");

        Ok(path)
    }
}
