use crate::error::StoreResult;
use crate::selector::{IndexedAttribute, Selector};
use crate::types::DocumentId;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// DocumentBackend: the document database the store sits on
//
// Stores raw JSON bodies under backend-assigned ids. Whether a body holds
// plaintext `{content, meta}` or an encrypted envelope plus blind index
// entries is decided above this layer.
// ---------------------------------------------------------------------------

/// A document as the backend returns it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub id: DocumentId,
    pub body: Value,
}

#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Make sure an index over `fields` exists. Idempotent.
    async fn ensure_index(&self, fields: &[&str]) -> StoreResult<()>;

    async fn insert(&self, body: Value) -> StoreResult<DocumentId>;

    async fn find(&self, selector: &Selector) -> StoreResult<Vec<RawDocument>>;

    /// Remove a document. Fails with `StoreError::NotFound` if `id` is unknown.
    async fn remove(&self, id: &DocumentId) -> StoreResult<()>;
}

#[async_trait]
impl<B: DocumentBackend + ?Sized> DocumentBackend for Arc<B> {
    async fn ensure_index(&self, fields: &[&str]) -> StoreResult<()> {
        (**self).ensure_index(fields).await
    }

    async fn insert(&self, body: Value) -> StoreResult<DocumentId> {
        (**self).insert(body).await
    }

    async fn find(&self, selector: &Selector) -> StoreResult<Vec<RawDocument>> {
        (**self).find(selector).await
    }

    async fn remove(&self, id: &DocumentId) -> StoreResult<()> {
        (**self).remove(id).await
    }
}

// ---------------------------------------------------------------------------
// IndexTokenizer: blind index capability
//
// Deterministic for a given key: the same (name, value) always yields the
// same entry, or lookups could never match.
// ---------------------------------------------------------------------------

pub trait IndexTokenizer: Send + Sync {
    /// Identifier of the key the tokens are computed under.
    fn index_id(&self) -> &str;

    fn compute_index_token(&self, name: &str, value: &Value) -> StoreResult<IndexedAttribute>;
}

// ---------------------------------------------------------------------------
// DocumentCipher: authenticated encryption of document bodies
// ---------------------------------------------------------------------------

pub trait DocumentCipher: Send + Sync {
    fn seal(&self, plaintext: &[u8]) -> StoreResult<Value>;
    fn open(&self, sealed: &Value) -> StoreResult<Vec<u8>>;
}
