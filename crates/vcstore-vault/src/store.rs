//! Document store façade over a [`DocumentBackend`].
//!
//! Plaintext mode persists `{content, meta}` as-is. Encrypted mode persists
//! `{jwe, indexed}`: the record sealed by a [`DocumentCipher`] plus blind
//! index entries from the [`BlindIndexTranslator`]. Callers use the same
//! filter-based API in both modes.

use crate::blind_index::{BlindIndexTranslator, HmacTokenizer};
use crate::envelope::EnvelopeCipher;
use crate::error::VaultResult;
use crate::key_hierarchy::KeyHierarchy;
use serde_json::{Map, Value};
use std::sync::Arc;
use vcstore_core::{
    index_entries_to_json, CredentialRecord, DocumentBackend, DocumentCipher, Filter,
    IndexTokenizer, RawDocument, StoreError, StoreResult, StoredDocument, INDEXED_FIELD,
};

/// Field holding the sealed record on an encrypted document.
pub const SEALED_FIELD: &str = "jwe";

pub struct DocumentStore<B: DocumentBackend> {
    backend: B,
    translator: BlindIndexTranslator,
    cipher: Option<Arc<dyn DocumentCipher>>,
}

impl<B: DocumentBackend> DocumentStore<B> {
    pub fn plaintext(backend: B) -> Self {
        Self {
            backend,
            translator: BlindIndexTranslator::plaintext(),
            cipher: None,
        }
    }

    pub fn encrypted(
        backend: B,
        tokenizer: Arc<dyn IndexTokenizer>,
        cipher: Arc<dyn DocumentCipher>,
    ) -> Self {
        Self {
            backend,
            translator: BlindIndexTranslator::blind(tokenizer),
            cipher: Some(cipher),
        }
    }

    /// Encrypted store keyed from a [`KeyHierarchy`]: HMAC tokenizer over
    /// the index key, envelope cipher over the sealing key.
    pub fn with_keys(backend: B, keys: &KeyHierarchy) -> VaultResult<Self> {
        let tokenizer = Arc::new(HmacTokenizer::from_hierarchy(keys)?);
        let cipher = Arc::new(EnvelopeCipher::from_hierarchy(keys)?);
        Ok(Self::encrypted(backend, tokenizer, cipher))
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Ask the backend for the indexes this mode relies on.
    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        self.backend
            .ensure_index(self.translator.index_fields())
            .await
    }

    pub async fn insert(&self, record: &CredentialRecord) -> StoreResult<StoredDocument> {
        let body = self.encode(record)?;
        let id = self.backend.insert(body).await?;
        tracing::debug!(document_id = %id, encrypted = self.is_encrypted(), "document stored");
        Ok(StoredDocument::from_record(id, record.clone()))
    }

    /// Documents matching every clause of `filter`.
    pub async fn find(&self, filter: &Filter) -> StoreResult<Vec<StoredDocument>> {
        let selector = self.translator.translate(filter)?;
        let raw = self.backend.find(&selector).await?;
        raw.into_iter().map(|doc| self.decode(doc)).collect()
    }

    /// Documents matching at least one of `filters`, in one backend lookup.
    pub async fn find_any(&self, filters: &[Filter]) -> StoreResult<Vec<StoredDocument>> {
        let selector = self.translator.translate_any(filters)?;
        let raw = self.backend.find(&selector).await?;
        raw.into_iter().map(|doc| self.decode(doc)).collect()
    }

    /// Remove the first document matching `filter`.
    ///
    /// Returns `false` when nothing matched or the backend reports the
    /// document as already gone; other backend errors propagate.
    pub async fn delete(&self, filter: &Filter) -> StoreResult<bool> {
        let selector = self.translator.translate(filter)?;
        let outcome = match self.backend.find(&selector).await {
            Ok(found) => match found.into_iter().next() {
                Some(doc) => self.backend.remove(&doc.id).await.map(|()| true),
                None => Ok(false),
            },
            Err(e) => Err(e),
        };

        match outcome {
            Err(e) if e.is_not_found() => {
                tracing::debug!(error = %e, "delete target already gone");
                Ok(false)
            }
            other => other,
        }
    }

    fn encode(&self, record: &CredentialRecord) -> StoreResult<Value> {
        let plain = record.to_value()?;
        let Some(cipher) = &self.cipher else {
            return Ok(plain);
        };

        let entries = self.translator.index_entries(&plain)?;
        let sealed = cipher.seal(&serde_json::to_vec(&plain)?)?;
        let mut body = Map::new();
        body.insert(SEALED_FIELD.to_string(), sealed);
        body.insert(INDEXED_FIELD.to_string(), index_entries_to_json(&entries));
        Ok(Value::Object(body))
    }

    fn decode(&self, raw: RawDocument) -> StoreResult<StoredDocument> {
        let Some(cipher) = &self.cipher else {
            return StoredDocument::from_body(raw.id, raw.body);
        };

        let sealed = raw.body.get(SEALED_FIELD).ok_or_else(|| {
            StoreError::Crypto(format!("document {} has no sealed payload", raw.id))
        })?;
        let plaintext = cipher.open(sealed)?;
        let record: CredentialRecord = serde_json::from_slice(&plaintext)?;
        Ok(StoredDocument::from_record(raw.id, record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory_backend::InMemoryBackend;
    use serde_json::json;
    use vcstore_core::{attr, Credential, Meta, ProfileId};

    fn record(id: &str, issuer: &str) -> CredentialRecord {
        CredentialRecord {
            content: Credential::new(json!({
                "id": id,
                "type": ["VerifiableCredential", "AlumniCredential"],
                "issuer": issuer
            })),
            meta: Meta {
                profile_id: Some(ProfileId::new("p1")),
                issuer: Some(issuer.to_string()),
                ..Meta::default()
            },
        }
    }

    fn encrypted_store() -> DocumentStore<InMemoryBackend> {
        DocumentStore::with_keys(
            InMemoryBackend::new(),
            &KeyHierarchy::from_raw_key([0x5a; 32]),
        )
        .unwrap()
    }

    fn by_id(id: &str) -> Filter {
        Filter::new()
            .eq(attr::META_PROFILE_ID, "p1")
            .eq(attr::CONTENT_ID, id)
    }

    #[tokio::test]
    async fn test_plaintext_roundtrip() {
        let store = DocumentStore::plaintext(InMemoryBackend::new());
        let rec = record("urn:1", "urn:issuer:A");
        let stored = store.insert(&rec).await.unwrap();

        let found = store.find(&by_id("urn:1")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, stored.id);
        assert_eq!(found[0].content, rec.content);
        assert!(!store.is_encrypted());
    }

    #[tokio::test]
    async fn test_encrypted_roundtrip() {
        let store = encrypted_store();
        let rec = record("urn:1", "urn:issuer:A");
        store.insert(&rec).await.unwrap();

        let found = store.find(&by_id("urn:1")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content, rec.content);
        assert_eq!(found[0].meta, rec.meta);
        assert!(store.is_encrypted());
    }

    #[tokio::test]
    async fn test_encrypted_body_layout() {
        let store = encrypted_store();
        store.insert(&record("urn:1", "urn:issuer:A")).await.unwrap();

        let bodies = store.backend().all_bodies();
        assert_eq!(bodies.len(), 1);
        assert!(bodies[0].get("jwe").is_some());
        assert!(bodies[0].get("content").is_none());
        assert!(bodies[0].get("meta").is_none());
        let groups = bodies[0]["indexed"].as_array().unwrap();
        assert_eq!(groups.len(), 1);
        assert!(groups[0]["hmac"]["id"]
            .as_str()
            .unwrap()
            .starts_with("urn:vcstore:hmac:"));
    }

    #[tokio::test]
    async fn test_find_any_single_lookup_no_duplicates() {
        let store = encrypted_store();
        store.insert(&record("urn:1", "urn:issuer:A")).await.unwrap();

        // both branches match the same document
        let filters = vec![
            Filter::new().eq(attr::CONTENT_TYPE, "AlumniCredential"),
            Filter::new().eq(attr::CONTENT_TYPE, "VerifiableCredential"),
        ];
        let found = store.find_any(&filters).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_existing_and_missing() {
        let store = DocumentStore::plaintext(InMemoryBackend::new());
        store.insert(&record("urn:1", "urn:issuer:A")).await.unwrap();

        assert!(store.delete(&by_id("urn:1")).await.unwrap());
        assert!(!store.delete(&by_id("urn:1")).await.unwrap());
        assert_eq!(store.backend().count(), 0);
    }

    #[tokio::test]
    async fn test_ensure_indexes_per_mode() {
        let plain = DocumentStore::plaintext(InMemoryBackend::new());
        plain.ensure_indexes().await.unwrap();
        assert_eq!(
            plain.backend().index_definitions(),
            vec![vec![
                "content.id".to_string(),
                "meta.parentId".to_string(),
                "meta.profileId".to_string(),
                "meta.displayable".to_string(),
            ]]
        );

        let enc = encrypted_store();
        enc.ensure_indexes().await.unwrap();
        assert_eq!(
            enc.backend().index_definitions(),
            vec![vec!["indexed".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_wrong_key_cannot_decode() {
        let backend = Arc::new(InMemoryBackend::new());
        let writer = DocumentStore::with_keys(
            backend.clone(),
            &KeyHierarchy::from_raw_key([0x01; 32]),
        )
        .unwrap();
        writer.insert(&record("urn:1", "urn:issuer:A")).await.unwrap();

        let reader = DocumentStore::with_keys(backend, &KeyHierarchy::from_raw_key([0x02; 32]))
            .unwrap();
        // different index key: the blinded lookup finds nothing
        assert!(reader.find(&by_id("urn:1")).await.unwrap().is_empty());
    }
}
