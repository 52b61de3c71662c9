use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};
use vcstore_core::{DocumentBackend, DocumentId, RawDocument, Selector, StoreError, StoreResult};

/// In-memory document backend implementing DocumentBackend.
///
/// Useful for testing and for scenarios where persistence isn't needed.
/// Documents are kept in insertion order, so `find` results are stable.
pub struct InMemoryBackend {
    docs: Mutex<Vec<RawDocument>>,
    indexes: Mutex<BTreeSet<Vec<String>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> StoreResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| StoreError::Backend(format!("lock poisoned: {}", e)))
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            docs: Mutex::new(Vec::new()),
            indexes: Mutex::new(BTreeSet::new()),
        }
    }

    /// All stored bodies (for testing/inspection).
    pub fn all_bodies(&self) -> Vec<Value> {
        lock(&self.docs)
            .map(|d| d.iter().map(|doc| doc.body.clone()).collect())
            .unwrap_or_default()
    }

    /// Index definitions requested so far (for testing/inspection).
    pub fn index_definitions(&self) -> Vec<Vec<String>> {
        lock(&self.indexes)
            .map(|i| i.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Get the number of stored documents.
    pub fn count(&self) -> usize {
        lock(&self.docs).map(|d| d.len()).unwrap_or(0)
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentBackend for InMemoryBackend {
    async fn ensure_index(&self, fields: &[&str]) -> StoreResult<()> {
        let mut indexes = lock(&self.indexes)?;
        indexes.insert(fields.iter().map(|f| f.to_string()).collect());
        Ok(())
    }

    async fn insert(&self, body: Value) -> StoreResult<DocumentId> {
        let id = DocumentId::generate();
        let mut docs = lock(&self.docs)?;
        docs.push(RawDocument {
            id: id.clone(),
            body,
        });
        Ok(id)
    }

    async fn find(&self, selector: &Selector) -> StoreResult<Vec<RawDocument>> {
        let docs = lock(&self.docs)?;
        Ok(docs
            .iter()
            .filter(|doc| selector.matches(&doc.body))
            .cloned()
            .collect())
    }

    async fn remove(&self, id: &DocumentId) -> StoreResult<()> {
        let mut docs = lock(&self.docs)?;
        let position = docs
            .iter()
            .position(|doc| &doc.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("document {}", id)))?;
        docs.remove(position);
        Ok(())
    }
}
