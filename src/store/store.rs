//! The document store
//!
//! A `Store` binds one file path to an in-memory collection. Every read
//! first checks the freshness token and reloads the whole file if another
//! writer has modified it since. Writes that touch the file run under the
//! advisory lock.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::StoreConfig;
use crate::lock::{self, LockPolicy};
use crate::observability::{log_event_with_fields, Event, ObservationScope};
use crate::query::Query;
use crate::storage::{self, Document, FreshnessToken, StoreError, StoreResult};

use super::cache::DocumentCache;

/// A persistent collection of JSON documents backed by one file
///
/// ```ignore
/// let mut store = Store::open("addresses.sds")?;
/// store.append(json!({"street": "Rue de la Paix", "city": "Paris"}))?;
/// let found = store.get(&Query::starts_with("street", "Rue"))?;
/// ```
#[derive(Debug)]
pub struct Store {
    config: StoreConfig,
    policy: LockPolicy,
    cache: DocumentCache,
}

impl Store {
    /// Opens the store at `path` with default settings, creating the file
    /// with only the metadata record if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::open_with(StoreConfig::new(path))
    }

    /// Opens a store from a full configuration.
    ///
    /// Nothing is read here; the collection is loaded on first access.
    pub fn open_with(config: StoreConfig) -> StoreResult<Self> {
        config
            .validate()
            .map_err(|e| StoreError::invalid_config(e.to_string()))?;

        let created = storage::create_if_absent(&config.path, &config.version, config.sync_writes)?;

        let event = if created {
            Event::StoreCreated
        } else {
            Event::StoreOpened
        };
        log_event_with_fields(event, &[("path", config.path.display().to_string().as_str())]);

        Ok(Self {
            policy: config.lock_policy(),
            config,
            cache: DocumentCache::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// True when the file changed since the last load or own write, or
    /// was never loaded.
    pub fn is_stale(&self) -> bool {
        storage::is_stale(self.cache.token(), self.path())
    }

    /// Reloads the collection if stale. Returns whether a reload happened.
    pub fn refresh(&mut self) -> StoreResult<bool> {
        if !self.is_stale() {
            return Ok(false);
        }
        if self.cache.is_loaded() {
            log_event_with_fields(
                Event::CacheStale,
                &[("path", self.path().display().to_string().as_str())],
            );
        }
        self.reload()?;
        Ok(true)
    }

    /// Unconditionally reloads the collection from the file.
    ///
    /// On failure the previous collection and token stay as they were.
    pub fn reload(&mut self) -> StoreResult<()> {
        let path = self.path().display().to_string();
        let scope = ObservationScope::with_fields("LOAD", &[("path", path.as_str())]);

        match storage::load(self.path(), self.config.skip_corrupt_records) {
            Ok(loaded) => {
                let documents = loaded.documents.len().to_string();
                let skipped = loaded.skipped.to_string();
                self.cache.replace(loaded);
                scope.complete_with_fields(&[
                    ("documents", documents.as_str()),
                    ("skipped", skipped.as_str()),
                ]);
                Ok(())
            }
            Err(e) => {
                scope.fail(&e.to_string());
                Err(e)
            }
        }
    }

    /// Documents matching `query`, in collection order.
    pub fn get(&mut self, query: &Query) -> StoreResult<Vec<&Document>> {
        self.refresh()?;
        Ok(self
            .cache
            .documents()
            .iter()
            .filter(|d| query.matches(d))
            .collect())
    }

    /// Mutable references to the documents matching `query`.
    ///
    /// Changes are made to the live collection and reach the file only
    /// through [`Store::save`].
    pub fn get_mut(&mut self, query: &Query) -> StoreResult<Vec<&mut Document>> {
        self.refresh()?;
        Ok(self
            .cache
            .documents_mut()
            .iter_mut()
            .filter(|d| query.matches(d))
            .collect())
    }

    /// Owned copies of the documents matching `query`.
    pub fn find(&mut self, query: &Query) -> StoreResult<Vec<Document>> {
        Ok(self.get(query)?.into_iter().cloned().collect())
    }

    /// The whole collection, reloaded first if stale.
    pub fn documents(&mut self) -> StoreResult<&[Document]> {
        self.refresh()?;
        Ok(self.cache.documents())
    }

    /// Adds a document to the in-memory collection only.
    pub fn add(&mut self, document: Document) -> StoreResult<()> {
        self.refresh()?;
        self.cache.push(document);
        Ok(())
    }

    /// Adds a document and durably appends it to the file.
    ///
    /// Under the lock the collection is brought up to date first, so the
    /// appended document lands after everything already on disk. If the
    /// write fails the document is removed from memory again.
    pub fn append(&mut self, document: Document) -> StoreResult<()> {
        self.append_with(document, storage::append_record)
    }

    /// Append sequence with the file write supplied by the caller.
    fn append_with<W>(&mut self, document: Document, write: W) -> StoreResult<()>
    where
        W: FnOnce(&Path, &str, bool) -> StoreResult<()>,
    {
        let framed = storage::frame_append(&document).map_err(StoreError::encode_failed)?;

        let mut guard = lock::acquire_with(self.path(), &self.policy)?;
        self.refresh()?;

        self.cache.push(document);
        if let Err(e) = write(self.path(), &framed, self.config.sync_writes) {
            self.cache.pop();
            log_event_with_fields(
                Event::AppendFailed,
                &[
                    ("path", self.path().display().to_string().as_str()),
                    ("reason", e.to_string().as_str()),
                ],
            );
            return Err(e);
        }

        self.restamp();
        log_event_with_fields(
            Event::AppendComplete,
            &[
                ("path", self.path().display().to_string().as_str()),
                ("documents", self.cache.len().to_string().as_str()),
            ],
        );

        guard.release()?;
        Ok(())
    }

    /// Rewrites the whole file from the in-memory collection.
    ///
    /// Memory is authoritative: changes another writer made since the
    /// last load are overwritten.
    pub fn save(&mut self) -> StoreResult<()> {
        let mut guard = lock::acquire_with(self.path(), &self.policy)?;

        if !self.cache.is_loaded() {
            self.reload()?;
        } else if self.is_stale() {
            log_event_with_fields(
                Event::SaveOverwroteExternal,
                &[("path", self.path().display().to_string().as_str())],
            );
        }

        let path = self.path().display().to_string();
        let scope = ObservationScope::with_fields("SAVE", &[("path", path.as_str())]);

        if let Err(e) = storage::rewrite(
            self.path(),
            self.cache.metadata(),
            self.cache.documents(),
            self.config.sync_writes,
        ) {
            scope.fail(&e.to_string());
            return Err(e);
        }

        self.restamp();
        let documents = self.cache.len().to_string();
        scope.complete_with_fields(&[("documents", documents.as_str())]);

        guard.release()?;
        Ok(())
    }

    /// The metadata record of the last load
    pub fn metadata(&self) -> &Value {
        self.cache.metadata()
    }

    /// Token of the last load or own write
    pub fn freshness(&self) -> Option<&FreshnessToken> {
        self.cache.token()
    }

    /// Records skipped by the last lenient load
    pub fn skipped_records(&self) -> usize {
        self.cache.skipped()
    }

    /// Stamps the file after an own write. If the stat fails the token is
    /// cleared so the next access reloads.
    fn restamp(&mut self) {
        match storage::stamp(self.path()) {
            Ok(token) => self.cache.set_token(Some(token)),
            Err(e) => {
                self.cache.set_token(None);
                log_event_with_fields(
                    Event::RestampFailed,
                    &[
                        ("path", self.path().display().to_string().as_str()),
                        ("reason", e.to_string().as_str()),
                    ],
                );
            }
        }
    }
}
