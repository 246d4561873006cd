//! In-memory document collection of a store
//!
//! Holds the decoded documents, the opaque metadata record and the
//! freshness token of the load or write that produced them. The cache
//! never touches the file; the store decides when it is replaced.

use serde_json::Value;

use crate::storage::{Document, FreshnessToken, LoadedStore};

#[derive(Debug, Default)]
pub struct DocumentCache {
    metadata: Value,
    documents: Vec<Document>,
    token: Option<FreshnessToken>,
    skipped: usize,
    loaded: bool,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards the current content and takes over a fresh load
    pub fn replace(&mut self, loaded: LoadedStore) {
        self.metadata = loaded.metadata;
        self.documents = loaded.documents;
        self.token = Some(loaded.token);
        self.skipped = loaded.skipped;
        self.loaded = true;
    }

    /// Whether the file has been loaded at least once
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn token(&self) -> Option<&FreshnessToken> {
        self.token.as_ref()
    }

    /// Replaces the token; `None` forces a reload on next access
    pub fn set_token(&mut self, token: Option<FreshnessToken>) {
        self.token = token;
    }

    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn documents_mut(&mut self) -> &mut [Document] {
        &mut self.documents
    }

    pub fn push(&mut self, document: Document) {
        self.documents.push(document);
    }

    /// Removes the most recently pushed document
    pub fn pop(&mut self) -> Option<Document> {
        self.documents.pop()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Records skipped by the last lenient load
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn loaded(documents: Vec<Value>) -> LoadedStore {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("db.sds");
        fs::write(&path, "{}").unwrap();
        LoadedStore {
            metadata: json!({"id": 0}),
            documents,
            token: crate::storage::stamp(&path).unwrap(),
            skipped: 0,
        }
    }

    #[test]
    fn test_new_cache_is_unloaded() {
        let cache = DocumentCache::new();
        assert!(!cache.is_loaded());
        assert!(cache.token().is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_replace_discards_previous_documents() {
        let mut cache = DocumentCache::new();
        cache.push(json!({"added": true}));

        cache.replace(loaded(vec![json!({"n": 1})]));
        assert!(cache.is_loaded());
        assert!(cache.token().is_some());
        assert_eq!(cache.documents(), &[json!({"n": 1})]);
    }

    #[test]
    fn test_push_pop() {
        let mut cache = DocumentCache::new();
        cache.push(json!({"n": 1}));
        cache.push(json!({"n": 2}));

        assert_eq!(cache.pop(), Some(json!({"n": 2})));
        assert_eq!(cache.len(), 1);
    }
}
