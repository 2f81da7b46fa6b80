use std::collections::BTreeMap;

use badge_bridge_core::Worker;
use parking_lot::Mutex;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Worker not found")]
    NotFound,
    #[error("{0}")]
    DuplicateCardUid(String),
}

/// Persistence seam for worker records. The bridge only depends on this
/// trait; a relational store plugs in behind it without touching dispatch.
pub trait WorkerStore: Send + Sync {
    /// All workers, ascending by `worker_id`.
    fn list(&self) -> Vec<Worker>;

    /// Inserts a worker, assigning the next id and `created_at`.
    fn create(&self, admin_id: i64, name: &str, card_uid: &str) -> Result<Worker, StoreError>;

    /// Partial update of the two mutable fields. Absent fields are left
    /// unchanged; with neither supplied this is a read-through of the
    /// current row. Never partially mutates on conflict.
    fn update(
        &self,
        worker_id: i64,
        name: Option<&str>,
        card_uid: Option<&str>,
    ) -> Result<Worker, StoreError>;

    fn delete(&self, worker_id: i64) -> Result<(), StoreError>;
}

const CREATE_CONFLICT: &str = "A worker with this card UID is already registered.";
const UPDATE_CONFLICT: &str = "This card UID is already in use by another worker.";

/// In-memory [`WorkerStore`] used for development and tests.
#[derive(Default)]
pub struct MemoryWorkerStore {
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    next_id: i64,
    workers: BTreeMap<i64, Worker>,
}

impl MemoryWorkerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkerStore for MemoryWorkerStore {
    fn list(&self) -> Vec<Worker> {
        self.inner.lock().workers.values().cloned().collect()
    }

    fn create(&self, admin_id: i64, name: &str, card_uid: &str) -> Result<Worker, StoreError> {
        let name = name.trim();
        let card_uid = card_uid.trim();
        let mut inner = self.inner.lock();
        if inner.workers.values().any(|w| w.card_uid == card_uid) {
            return Err(StoreError::DuplicateCardUid(CREATE_CONFLICT.into()));
        }
        inner.next_id += 1;
        let worker = Worker {
            worker_id: inner.next_id,
            admin_id,
            name: name.to_string(),
            card_uid: card_uid.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        inner.workers.insert(worker.worker_id, worker.clone());
        Ok(worker)
    }

    fn update(
        &self,
        worker_id: i64,
        name: Option<&str>,
        card_uid: Option<&str>,
    ) -> Result<Worker, StoreError> {
        let mut inner = self.inner.lock();
        if !inner.workers.contains_key(&worker_id) {
            return Err(StoreError::NotFound);
        }
        if let Some(uid) = card_uid {
            let uid = uid.trim();
            let taken = inner
                .workers
                .values()
                .any(|w| w.worker_id != worker_id && w.card_uid == uid);
            if taken {
                return Err(StoreError::DuplicateCardUid(UPDATE_CONFLICT.into()));
            }
        }
        let worker = inner
            .workers
            .get_mut(&worker_id)
            .ok_or(StoreError::NotFound)?;
        if let Some(name) = name {
            worker.name = name.trim().to_string();
        }
        if let Some(uid) = card_uid {
            worker.card_uid = uid.trim().to_string();
        }
        Ok(worker.clone())
    }

    fn delete(&self, worker_id: i64) -> Result<(), StoreError> {
        match self.inner.lock().workers.remove(&worker_id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn create_assigns_ascending_ids_and_trims() {
        let store = MemoryWorkerStore::new();
        let a = store.create(1, "  Kim  ", " AB12 ").unwrap();
        let b = store.create(1, "Lee", "CD34").unwrap();
        assert_eq!(a.worker_id, 1);
        assert_eq!(a.name, "Kim");
        assert_eq!(a.card_uid, "AB12");
        assert_eq!(b.worker_id, 2);

        let listed = store.list();
        assert_eq!(
            listed.iter().map(|w| w.worker_id).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn create_rejects_duplicate_card_uid() {
        let store = MemoryWorkerStore::new();
        store.create(1, "Kim", "AB12").unwrap();
        let err = store.create(1, "Lee", "AB12").unwrap_err();
        assert!(matches!(err, StoreError::DuplicateCardUid(_)));
    }

    #[test]
    fn concurrent_create_same_uid_yields_one_conflict() {
        let store = Arc::new(MemoryWorkerStore::new());
        let handles: Vec<_> = (0..2)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.create(1, &format!("w{i}"), "SAME"))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::DuplicateCardUid(_))))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 1);
    }

    #[test]
    fn update_is_partial_and_read_through() {
        let store = MemoryWorkerStore::new();
        let w = store.create(1, "Kim", "AB12").unwrap();

        let renamed = store.update(w.worker_id, Some("Park"), None).unwrap();
        assert_eq!(renamed.name, "Park");
        assert_eq!(renamed.card_uid, "AB12");

        let unchanged = store.update(w.worker_id, None, None).unwrap();
        assert_eq!(unchanged, renamed);
    }

    #[test]
    fn update_conflict_does_not_mutate() {
        let store = MemoryWorkerStore::new();
        let a = store.create(1, "Kim", "AB12").unwrap();
        store.create(1, "Lee", "CD34").unwrap();

        let err = store
            .update(a.worker_id, Some("Renamed"), Some("CD34"))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateCardUid(_)));

        let current = store.update(a.worker_id, None, None).unwrap();
        assert_eq!(current.name, "Kim");
        assert_eq!(current.card_uid, "AB12");
    }

    #[test]
    fn update_allows_keeping_own_uid() {
        let store = MemoryWorkerStore::new();
        let a = store.create(1, "Kim", "AB12").unwrap();
        let updated = store.update(a.worker_id, Some("Kim J"), Some("AB12")).unwrap();
        assert_eq!(updated.card_uid, "AB12");
    }

    #[test]
    fn missing_worker_is_not_found() {
        let store = MemoryWorkerStore::new();
        assert_eq!(store.update(99, None, None), Err(StoreError::NotFound));
        assert_eq!(store.delete(99), Err(StoreError::NotFound));
    }

    #[test]
    fn delete_removes_exactly_once() {
        let store = MemoryWorkerStore::new();
        let w = store.create(1, "Kim", "AB12").unwrap();
        store.delete(w.worker_id).unwrap();
        assert_eq!(store.delete(w.worker_id), Err(StoreError::NotFound));
        assert!(store.list().is_empty());
    }
}
