//! Thread-shared store handle
//!
//! One mutex serializes every operation on the wrapped store. Results are
//! returned as owned documents since references cannot outlive the guard.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::StoreConfig;
use crate::query::Query;
use crate::storage::{Document, StoreResult};

use super::store::Store;

/// Cloneable handle to a store shared across threads
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<Store>>,
}

impl SharedStore {
    pub fn new(store: Store) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        Store::open(path).map(Self::new)
    }

    pub fn open_with(config: StoreConfig) -> StoreResult<Self> {
        Store::open_with(config).map(Self::new)
    }

    pub fn get(&self, query: &Query) -> StoreResult<Vec<Document>> {
        self.lock().find(query)
    }

    pub fn add(&self, document: Document) -> StoreResult<()> {
        self.lock().add(document)
    }

    pub fn append(&self, document: Document) -> StoreResult<()> {
        self.lock().append(document)
    }

    pub fn save(&self) -> StoreResult<()> {
        self.lock().save()
    }

    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.lock().documents()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Runs `f` with exclusive access to the store, for in-place updates
    /// through [`Store::get_mut`] followed by a save.
    pub fn with<R>(&self, f: impl FnOnce(&mut Store) -> R) -> R {
        f(&mut self.lock())
    }

    // Poison is ignored; the next access re-checks freshness anyway.
    fn lock(&self) -> MutexGuard<'_, Store> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_concurrent_appends_all_land() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("db.sds");
        let shared = SharedStore::open(&path).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = shared.clone();
                thread::spawn(move || {
                    for i in 0..5 {
                        store.append(json!({"thread": t, "i": i})).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(shared.len().unwrap(), 20);
        let mut reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.documents().unwrap().len(), 20);
    }

    #[test]
    fn test_with_updates_in_place() {
        let tmp = TempDir::new().unwrap();
        let shared = SharedStore::open(tmp.path().join("db.sds")).unwrap();
        shared.append(json!({"name": "a", "seen": false})).unwrap();

        shared
            .with(|store| -> StoreResult<()> {
                for doc in store.get_mut(&Query::equals("name", "a"))? {
                    doc["seen"] = json!(true);
                }
                store.save()
            })
            .unwrap();

        assert_eq!(shared.get(&Query::equals("seen", true)).unwrap().len(), 1);
    }
}
