//! In-memory run store for tests and storeless embedders.

use std::sync::Mutex;

use super::{RunStore, StoreError};
use crate::migration::{RunRecord, RunStatus};

/// [`RunStore`] keeping records in a `Vec` behind a mutex.
///
/// Ids are assigned sequentially from 1 in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<RunRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Check if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap().is_empty()
    }
}

impl RunStore for MemoryStore {
    fn create_store(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn clear_store(&self) -> Result<(), StoreError> {
        self.records.lock().unwrap().clear();
        Ok(())
    }

    fn last_run(&self) -> Result<Option<RunRecord>, StoreError> {
        Ok(self.records.lock().unwrap().last().cloned())
    }

    fn last_run_with_status(&self, status: RunStatus) -> Result<Option<RunRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|record| record.status == status)
            .cloned())
    }

    fn last_run_by_name(&self, name: &str) -> Result<Option<RunRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|record| record.name == name)
            .cloned())
    }

    fn all_runs_by_name(&self, name: &str) -> Result<Vec<RunRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.name == name)
            .cloned()
            .collect())
    }

    fn list(&self) -> Result<Vec<RunRecord>, StoreError> {
        Ok(self.records.lock().unwrap().clone())
    }

    fn save(&self, record: &RunRecord, attempt_error: Option<&str>) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap();

        let mut stored = record.clone();
        stored.id = records.len() as i64 + 1;
        if let Some(detail) = attempt_error {
            stored.status = RunStatus::Failure;
            stored.error = detail.to_string();
        }

        records.push(stored);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::migration::Direction;

    fn record(name: &str, seconds: i64) -> RunRecord {
        RunRecord {
            id: 0,
            name: name.to_string(),
            direction: Direction::Up,
            status: RunStatus::Success,
            error: String::new(),
            timestamp: DateTime::from_timestamp(seconds, 0).unwrap(),
            created: Utc::now(),
        }
    }

    #[test]
    fn test_save_assigns_ids() {
        let store = MemoryStore::new();
        store.save(&record("Migration_1_up", 1), None).unwrap();
        store.save(&record("Migration_5_up", 5), None).unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, 1);
        assert_eq!(all[1].id, 2);
    }

    #[test]
    fn test_attempt_error_forces_failure() {
        let store = MemoryStore::new();
        store
            .save(&record("Migration_1_up", 1), Some("boom"))
            .unwrap();

        let last = store.last_run().unwrap().unwrap();
        assert_eq!(last.status, RunStatus::Failure);
        assert_eq!(last.error, "boom");
    }

    #[test]
    fn test_point_queries() {
        let store = MemoryStore::new();
        assert!(store.last_run().unwrap().is_none());

        store.save(&record("Migration_1_up", 1), None).unwrap();
        store.save(&record("Migration_1_up", 1), Some("boom")).unwrap();
        store.save(&record("Migration_5_up", 5), None).unwrap();

        assert_eq!(store.last_run().unwrap().unwrap().name, "Migration_5_up");
        assert_eq!(
            store
                .last_run_with_status(RunStatus::Failure)
                .unwrap()
                .unwrap()
                .name,
            "Migration_1_up"
        );
        assert_eq!(
            store
                .last_run_by_name("Migration_1_up")
                .unwrap()
                .unwrap()
                .status,
            RunStatus::Failure
        );
        assert_eq!(store.all_runs_by_name("Migration_1_up").unwrap().len(), 2);
        assert!(store.all_runs_by_name("Migration_9_up").unwrap().is_empty());

        store.clear_store().unwrap();
        assert!(store.is_empty());
    }
}
