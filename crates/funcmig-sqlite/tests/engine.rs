//! Integration tests driving the migration engine against the SQLite
//! store, end to end.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use funcmig::{
    file_name_timestamp, Direction, Error, MigrationProvider, Migrator, OperationSet, RunStatus,
    RunStore,
};
use funcmig_sqlite::SqliteStore;

/// Shared record of operation invocations, in call order.
#[derive(Clone, Default)]
struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

/// Provider exposing an up/down pair per timestamp. Names present in
/// `failing` return an error when invoked; the set is shared so tests
/// can break and fix operations between engine calls.
struct TestProvider {
    timestamps: Vec<i64>,
    log: CallLog,
    failing: Arc<Mutex<HashSet<String>>>,
    migrations_dir: PathBuf,
}

impl MigrationProvider for TestProvider {
    fn operations(&self) -> OperationSet {
        let mut set = OperationSet::new();
        for &ts in &self.timestamps {
            for direction in [Direction::Up, Direction::Down] {
                let name = format!("Migration_{}{}", ts, direction.suffix());
                let log = self.log.clone();
                let failing = Arc::clone(&self.failing);
                let op_name = name.clone();
                set = set.register(name, move || {
                    log.0.lock().unwrap().push(op_name.clone());
                    if failing.lock().unwrap().contains(&op_name) {
                        return Err("some migration error".into());
                    }
                    Ok(())
                });
            }
        }
        set
    }

    fn migrations_path(&self) -> PathBuf {
        self.migrations_dir.clone()
    }

    fn package_name(&self) -> String {
        "app_migrations".to_string()
    }
}

struct TestContext {
    migrator: Migrator<SqliteStore, TestProvider>,
    log: CallLog,
    failing: Arc<Mutex<HashSet<String>>>,
    _dir: tempfile::TempDir,
}

impl TestContext {
    fn new(timestamps: &[i64]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let log = CallLog::default();
        let failing = Arc::new(Mutex::new(HashSet::new()));

        let provider = TestProvider {
            timestamps: timestamps.to_vec(),
            log: log.clone(),
            failing: Arc::clone(&failing),
            migrations_dir: dir.path().to_path_buf(),
        };

        let store = SqliteStore::open(dir.path().join("runs.db")).unwrap();
        let migrator = Migrator::new(store, provider).unwrap();

        Self {
            migrator,
            log,
            failing,
            _dir: dir,
        }
    }

    fn break_migration(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    fn fix_migration(&self, name: &str) {
        self.failing.lock().unwrap().remove(name);
    }
}

#[test]
fn test_discovery_partitions_and_orders() {
    let ctx = TestContext::new(&[15, 1, 18, 5, 10]);

    assert_eq!(ctx.migrator.up_migrations().len(), 5);
    assert_eq!(ctx.migrator.down_migrations().len(), 5);

    let up: Vec<i64> = ctx
        .migrator
        .up_migrations()
        .iter()
        .map(|d| d.timestamp.timestamp())
        .collect();
    assert_eq!(up, vec![1, 5, 10, 15, 18]);

    let down: Vec<i64> = ctx
        .migrator
        .down_migrations()
        .iter()
        .map(|d| d.timestamp.timestamp())
        .collect();
    assert_eq!(down, vec![18, 15, 10, 5, 1]);
}

#[test]
fn test_latest_runs_everything_then_nothing() {
    let ctx = TestContext::new(&[1, 5, 10, 18]);

    ctx.migrator.latest().unwrap();

    assert_eq!(
        ctx.log.calls(),
        vec![
            "Migration_1_up",
            "Migration_5_up",
            "Migration_10_up",
            "Migration_18_up"
        ]
    );

    let records = ctx.migrator.store().list().unwrap();
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.status == RunStatus::Success));

    ctx.migrator.latest().unwrap();
    assert_eq!(ctx.log.count(), 4);
    assert_eq!(ctx.migrator.store().list().unwrap().len(), 4);
}

#[test]
fn test_latest_resumes_after_earlier_up() {
    let ctx = TestContext::new(&[1, 5, 10, 18]);

    ctx.migrator.up("Migration_1_up").unwrap();
    ctx.migrator.latest().unwrap();

    assert_eq!(
        ctx.log.calls(),
        vec![
            "Migration_1_up",
            "Migration_5_up",
            "Migration_10_up",
            "Migration_18_up"
        ]
    );
    assert_eq!(ctx.migrator.store().list().unwrap().len(), 4);
}

#[test]
fn test_up_does_not_rerun_successful_migration() {
    let ctx = TestContext::new(&[1]);

    ctx.migrator.latest().unwrap();
    assert_eq!(ctx.log.count(), 1);

    ctx.migrator.up("Migration_1_up").unwrap();
    assert_eq!(ctx.log.count(), 1);
    assert_eq!(ctx.migrator.store().list().unwrap().len(), 1);
}

#[test]
fn test_up_accepts_bare_timestamp() {
    let ctx = TestContext::new(&[1, 5, 10, 15, 18]);

    ctx.migrator.up("15").unwrap();

    assert_eq!(
        ctx.log.calls(),
        vec![
            "Migration_1_up",
            "Migration_5_up",
            "Migration_10_up",
            "Migration_15_up"
        ]
    );
}

#[test]
fn test_failed_up_migration_is_recorded() {
    let ctx = TestContext::new(&[1]);
    ctx.break_migration("Migration_1_up");

    let err = ctx.migrator.latest().unwrap_err();
    assert!(matches!(err, Error::Operation { ref name, .. } if name == "Migration_1_up"));

    let records = ctx.migrator.store().list().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, RunStatus::Failure);
    assert_eq!(records[0].error, "some migration error");
}

#[test]
fn test_rerun_failed_up_migration() {
    let ctx = TestContext::new(&[1]);
    ctx.break_migration("Migration_1_up");

    assert!(ctx.migrator.latest().is_err());

    ctx.fix_migration("Migration_1_up");
    ctx.migrator.latest().unwrap();

    let runs = ctx
        .migrator
        .store()
        .all_runs_by_name("Migration_1_up")
        .unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].status, RunStatus::Failure);
    assert_eq!(runs[1].status, RunStatus::Success);
}

#[test]
fn test_down_runs_from_newest_through_name() {
    let ctx = TestContext::new(&[1, 5, 10, 15, 18]);

    ctx.migrator.up("Migration_18_up").unwrap();
    ctx.migrator.down("Migration_1_down").unwrap();

    let calls = ctx.log.calls();
    assert_eq!(
        &calls[5..],
        &[
            "Migration_18_down",
            "Migration_15_down",
            "Migration_10_down",
            "Migration_5_down",
            "Migration_1_down"
        ]
    );

    let entries = ctx
        .migrator
        .store()
        .all_runs_by_name("Migration_1_down")
        .unwrap();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_rerun_failed_down_migration() {
    let ctx = TestContext::new(&[1, 5, 10, 15, 18]);

    ctx.migrator.up("Migration_18_up").unwrap();

    ctx.break_migration("Migration_18_down");
    assert!(ctx.migrator.down("Migration_1_down").is_err());

    ctx.fix_migration("Migration_18_down");
    ctx.migrator.down("Migration_1").unwrap();

    let failed = ctx
        .migrator
        .store()
        .all_runs_by_name("Migration_18_down")
        .unwrap();
    assert_eq!(failed.len(), 2);
    assert_eq!(failed[0].status, RunStatus::Failure);
    assert_eq!(failed[1].status, RunStatus::Success);
}

#[test]
fn test_latest_down_latest_replays_everything() {
    let ctx = TestContext::new(&[1, 5, 10, 15, 18]);

    ctx.migrator.latest().unwrap();
    ctx.migrator.down("1").unwrap();
    ctx.migrator.latest().unwrap();

    assert_eq!(ctx.migrator.store().list().unwrap().len(), 15);
}

#[test]
fn test_status_covers_every_up_migration() {
    let ctx = TestContext::new(&[1, 5, 10, 15, 18]);

    ctx.migrator.up("15").unwrap();

    let status = ctx.migrator.status().unwrap();
    assert_eq!(status.migrations.len(), ctx.migrator.up_migrations().len());

    let unrun = "Migration_18_up";
    for entry in &status.migrations {
        if entry.migration.name == unrun {
            assert!(entry.runs.is_empty());
        } else {
            assert_eq!(entry.runs.len(), 1);
            assert_eq!(entry.runs[0].status, RunStatus::Success);
        }
    }

    let rendered = serde_json::to_string(&status).unwrap();
    assert!(rendered.contains("Migration_18_up"));
}

#[test]
fn test_create_migration_writes_file() {
    let ctx = TestContext::new(&[1]);

    let path = ctx.migrator.create_migration().unwrap();
    let stamp = file_name_timestamp(path.file_name().unwrap().to_str().unwrap()).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("app_migrations"));
    assert!(contents.contains(&format!("Migration_{}_up", stamp.timestamp())));
    assert!(contents.contains(&format!("Migration_{}_down", stamp.timestamp())));
}
