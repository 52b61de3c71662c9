//! The public credential repository.
//!
//! A repository is bound to one profile scope for its lifetime. Every read is
//! filtered by that scope and every write stamps it into `meta.profileId`.
//! Requests are independent; the repository keeps no state between them.

use serde_json::Value;
use std::collections::HashSet;
use vcstore_core::{
    attr, Credential, CredentialId, CredentialRecord, DocumentBackend, DocumentId, Filter, Meta,
    ProfileId, StoreError, StoreResult, StoredDocument,
};
use vcstore_vault::DocumentStore;

use crate::config::MatchingConfig;
use crate::executor::{ConcurrentExecutor, DEFAULT_MAX_CONCURRENCY};
use crate::query::{IssuerPolicy, QueryByExample, QueryCompiler};

/// Matching engine settings for a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryOptions {
    pub max_concurrency: usize,
    pub issuer_policy: IssuerPolicy,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            issuer_policy: IssuerPolicy::default(),
        }
    }
}

impl From<&MatchingConfig> for RepositoryOptions {
    fn from(config: &MatchingConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
            issuer_policy: config.issuer_policy,
        }
    }
}

/// Conjunctive `find` filter. Unset fields are unconstrained; `types` is a
/// union (any listed type).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindFilter {
    pub types: Vec<String>,
    pub parent_id: Option<String>,
    pub displayable: Option<bool>,
}

impl FindFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, credential_type: impl Into<String>) -> Self {
        self.types.push(credential_type.into());
        self
    }

    pub fn with_parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_displayable(mut self, displayable: bool) -> Self {
        self.displayable = Some(displayable);
        self
    }
}

pub struct CredentialRepository<B: DocumentBackend> {
    store: DocumentStore<B>,
    profile: ProfileId,
    compiler: QueryCompiler,
    executor: ConcurrentExecutor,
}

impl<B: DocumentBackend> CredentialRepository<B> {
    /// Bind a store to `profile` and make sure the backend indexes exist.
    pub async fn open(
        store: DocumentStore<B>,
        profile: ProfileId,
        options: RepositoryOptions,
    ) -> StoreResult<Self> {
        if profile.as_str().trim().is_empty() {
            return Err(StoreError::InvalidArgument(
                "profile id must not be empty".into(),
            ));
        }
        store.ensure_indexes().await?;
        let compiler = QueryCompiler::new(options.issuer_policy);
        let executor = ConcurrentExecutor::new(options.max_concurrency);
        tracing::info!(
            profile = %profile,
            encrypted = store.is_encrypted(),
            max_concurrency = executor.limit(),
            issuer_policy = ?compiler.policy(),
            "credential repository opened"
        );
        Ok(Self {
            store,
            profile,
            compiler,
            executor,
        })
    }

    pub fn profile(&self) -> &ProfileId {
        &self.profile
    }

    pub fn store(&self) -> &DocumentStore<B> {
        &self.store
    }

    fn scoped(&self) -> Filter {
        Filter::new().eq(attr::META_PROFILE_ID, self.profile.as_str())
    }

    fn by_id(&self, id: &CredentialId) -> StoreResult<Filter> {
        if id.as_str().is_empty() {
            return Err(StoreError::InvalidArgument("credential id is required".into()));
        }
        Ok(self.scoped().eq(attr::CONTENT_ID, id.as_str()))
    }

    /// The credential with this id, or `NotFound`.
    pub async fn get(&self, id: &CredentialId) -> StoreResult<StoredDocument> {
        let filter = self.by_id(id)?;
        self.store
            .find(&filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("credential {}", id)))
    }

    pub async fn find(&self, filter: &FindFilter) -> StoreResult<Vec<StoredDocument>> {
        let mut query = self.scoped();
        match filter.types.len() {
            0 => {}
            1 => query = query.eq(attr::CONTENT_TYPE, filter.types[0].as_str()),
            _ => {
                let types = filter.types.iter().cloned().map(Value::String).collect();
                query = query.any_of(attr::CONTENT_TYPE, types);
            }
        }
        if let Some(parent_id) = &filter.parent_id {
            query = query.eq(attr::META_PARENT_ID, parent_id.as_str());
        }
        if let Some(displayable) = filter.displayable {
            query = query.eq(attr::META_DISPLAYABLE, displayable);
        }

        let found = self.store.find(&query).await?;
        tracing::debug!(profile = %self.profile, count = found.len(), "find");
        Ok(found)
    }

    /// Store a credential. `meta.issuer` and `meta.profileId` are always
    /// derived here; caller-supplied values for them are discarded.
    pub async fn insert(
        &self,
        credential: Credential,
        meta: Option<Meta>,
    ) -> StoreResult<StoredDocument> {
        let issuer = match credential.issuer_id() {
            Ok(issuer) => issuer,
            Err(e) => {
                tracing::warn!(error = %e, "rejected credential");
                return Err(e);
            }
        };
        match credential.id() {
            Some(id) if !id.is_empty() => {}
            _ => {
                return Err(StoreError::Validation(
                    "a verifiable credential must have a non-empty string id".into(),
                ))
            }
        }

        let mut meta = meta.unwrap_or_default();
        let shadowed = meta.strip_shadowing_extra();
        if !shadowed.is_empty() {
            tracing::warn!(keys = ?shadowed, "discarded metadata keys shadowing managed fields");
        }
        meta.issuer = Some(issuer);
        meta.profile_id = Some(self.profile.clone());

        let stored = self
            .store
            .insert(&CredentialRecord {
                content: credential,
                meta,
            })
            .await?;
        tracing::info!(
            document_id = %stored.id,
            credential_id = stored.content.id().unwrap_or_default(),
            "credential stored"
        );
        Ok(stored)
    }

    /// Remove the credential with this id. `false` if there was none.
    pub async fn delete(&self, id: &CredentialId) -> StoreResult<bool> {
        let filter = self.by_id(id)?;
        let removed = self.store.delete(&filter).await?;
        tracing::info!(credential_id = %id, removed, "delete");
        Ok(removed)
    }

    /// Run a raw `{type, credentialQuery}` request.
    pub async fn match_query(&self, query: &Value) -> StoreResult<Vec<StoredDocument>> {
        let query = QueryByExample::from_request(query)?;
        self.match_example(query).await
    }

    /// Credentials satisfying each query item, concatenated in item order.
    /// A credential satisfying two items appears twice.
    pub async fn match_example(&self, query: QueryByExample) -> StoreResult<Vec<StoredDocument>> {
        let compiled = self.compiler.compile(query)?;

        let results = self
            .executor
            .run(&compiled.sub_queries, |index, sub_query| async move {
                let filters = sub_query.filters(&self.profile);
                tracing::debug!(item = index, candidates = filters.len(), "dispatching sub-query");
                let found = self.store.find_any(&filters).await?;
                Ok(unique_by_id(found))
            })
            .await?;

        tracing::debug!(
            items = compiled.sub_queries.len(),
            results = results.len(),
            "match complete"
        );
        Ok(results)
    }
}

fn unique_by_id(docs: Vec<StoredDocument>) -> Vec<StoredDocument> {
    let mut seen: HashSet<DocumentId> = HashSet::new();
    docs.into_iter()
        .filter(|doc| seen.insert(doc.id.clone()))
        .collect()
}
