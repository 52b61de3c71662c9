//! Blind indexing: equality search over encrypted documents.
//!
//! An attribute `(name, value)` is turned into an [`IndexedAttribute`] whose
//! name and value are each an HMAC under the store's index key. Documents
//! carry one such entry per indexed attribute (one per element for array
//! attributes); a lookup blinds the wanted pair the same way and asks the
//! backend for documents carrying that exact entry. The backend only ever
//! compares opaque strings.
//!
//! Conjunctions are several entries that must all be present on the same
//! document. Pairs are never combined into a single token.

use crate::error::{VaultError, VaultResult};
use crate::key_hierarchy::KeyHierarchy;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::sync::Arc;
use vcstore_core::{
    attr, resolve_path, Clause, Filter, IndexTokenizer, IndexedAttribute, Selector, StoreError,
    StoreResult, INDEXED_FIELD,
};
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Fields a plaintext backend should index.
const PLAINTEXT_INDEX_FIELDS: [&str; 4] = [
    attr::CONTENT_ID,
    attr::META_PARENT_ID,
    attr::META_PROFILE_ID,
    attr::META_DISPLAYABLE,
];

/// Fields an encrypted backend should index.
const BLIND_INDEX_FIELDS: [&str; 1] = [INDEXED_FIELD];

// ---------------------------------------------------------------------------
// HmacTokenizer
// ---------------------------------------------------------------------------

/// HMAC-SHA256 blind index tokens.
///
/// `name  = b64url(HMAC(key, name))`
/// `value = b64url(HMAC(key, {name: value}))`
///
/// The value MAC covers the name too, so equal values under different
/// attributes produce unrelated tokens.
pub struct HmacTokenizer {
    index_id: String,
    key: Zeroizing<[u8; 32]>,
}

impl HmacTokenizer {
    pub fn new(index_id: impl Into<String>, key: Zeroizing<[u8; 32]>) -> Self {
        Self {
            index_id: index_id.into(),
            key,
        }
    }

    pub fn from_hierarchy(keys: &KeyHierarchy) -> VaultResult<Self> {
        Ok(Self::new(keys.index_id()?, keys.index_key()?))
    }

    fn blind(&self, data: &[u8]) -> VaultResult<String> {
        let mut mac = HmacSha256::new_from_slice(&*self.key)
            .map_err(|e| VaultError::InvalidKey(format!("HMAC init failed: {}", e)))?;
        mac.update(data);
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }
}

impl IndexTokenizer for HmacTokenizer {
    fn index_id(&self) -> &str {
        &self.index_id
    }

    fn compute_index_token(&self, name: &str, value: &Value) -> StoreResult<IndexedAttribute> {
        if name.is_empty() {
            return Err(StoreError::InvalidArgument(
                "index attribute name must not be empty".into(),
            ));
        }
        if value.is_null() {
            return Err(StoreError::InvalidArgument(format!(
                "index attribute {} has no value",
                name
            )));
        }

        let mut pair = serde_json::Map::new();
        pair.insert(name.to_string(), value.clone());
        let pair_bytes = serde_json::to_vec(&Value::Object(pair))?;

        Ok(IndexedAttribute {
            index_id: self.index_id.clone(),
            name: self.blind(name.as_bytes())?,
            value: self.blind(&pair_bytes)?,
        })
    }
}

// ---------------------------------------------------------------------------
// BlindIndexTranslator
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum IndexMode {
    Plaintext,
    Blind(Arc<dyn IndexTokenizer>),
}

/// Maps logical filters onto backend selectors.
///
/// In plaintext mode a clause becomes a field-equality selector; in blind
/// mode it becomes a match on a blinded index entry.
#[derive(Clone)]
pub struct BlindIndexTranslator {
    mode: IndexMode,
}

impl BlindIndexTranslator {
    pub fn plaintext() -> Self {
        Self {
            mode: IndexMode::Plaintext,
        }
    }

    pub fn blind(tokenizer: Arc<dyn IndexTokenizer>) -> Self {
        Self {
            mode: IndexMode::Blind(tokenizer),
        }
    }

    /// Fields the backend should index for this mode.
    pub fn index_fields(&self) -> &'static [&'static str] {
        match self.mode {
            IndexMode::Plaintext => &PLAINTEXT_INDEX_FIELDS,
            IndexMode::Blind(_) => &BLIND_INDEX_FIELDS,
        }
    }

    /// Translate one `name = value` constraint.
    pub fn translate_equals(&self, name: &str, value: &Value) -> StoreResult<Selector> {
        if name.is_empty() {
            return Err(StoreError::InvalidArgument(
                "constraint attribute name must not be empty".into(),
            ));
        }
        if value.is_null() {
            return Err(StoreError::InvalidArgument(format!(
                "constraint on {} has no value",
                name
            )));
        }
        match &self.mode {
            IndexMode::Plaintext => Ok(Selector::field(name, value.clone())),
            IndexMode::Blind(tokenizer) => Ok(Selector::Indexed(
                tokenizer.compute_index_token(name, value)?,
            )),
        }
    }

    pub fn translate_clause(&self, clause: &Clause) -> StoreResult<Selector> {
        match clause {
            Clause::Equals { name, value } => self.translate_equals(name, value),
            Clause::AnyOf { name, values } => {
                let mut alternatives = values
                    .iter()
                    .map(|value| self.translate_equals(name, value))
                    .collect::<StoreResult<Vec<_>>>()?;
                if alternatives.len() == 1 {
                    Ok(alternatives.remove(0))
                } else {
                    Ok(Selector::Or(alternatives))
                }
            }
        }
    }

    /// Translate a conjunctive filter.
    pub fn translate(&self, filter: &Filter) -> StoreResult<Selector> {
        let parts = filter
            .clauses()
            .iter()
            .map(|clause| self.translate_clause(clause))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Selector::And(parts))
    }

    /// Translate a disjunction of filters into a single selector, so the
    /// whole group is one backend round trip.
    pub fn translate_any(&self, filters: &[Filter]) -> StoreResult<Selector> {
        let branches = filters
            .iter()
            .map(|filter| self.translate(filter))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Selector::Or(branches))
    }

    /// Blind index entries for a plaintext `{content, meta}` body.
    /// Empty in plaintext mode.
    pub fn index_entries(&self, body: &Value) -> StoreResult<Vec<IndexedAttribute>> {
        let IndexMode::Blind(tokenizer) = &self.mode else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        for name in attr::INDEXED {
            match resolve_path(body, name) {
                None | Some(Value::Null) => {}
                Some(Value::Array(items)) => {
                    for item in items.iter().filter(|item| !item.is_null()) {
                        entries.push(tokenizer.compute_index_token(name, item)?);
                    }
                }
                Some(value) => entries.push(tokenizer.compute_index_token(name, value)?),
            }
        }
        entries.sort();
        entries.dedup();
        Ok(entries)
    }
}

impl std::fmt::Debug for BlindIndexTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.mode {
            IndexMode::Plaintext => write!(f, "BlindIndexTranslator(plaintext)"),
            IndexMode::Blind(t) => write!(f, "BlindIndexTranslator(blind, {})", t.index_id()),
        }
    }
}
