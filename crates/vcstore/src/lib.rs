//! vcstore: a verifiable credential store.
//!
//! Credentials are kept in a document store, either as plaintext
//! `{content, meta}` documents or sealed with blind index entries so the
//! backend can answer equality lookups without seeing plaintext. On top of
//! that sits a query-by-example engine: a request naming credential types and
//! trusted issuers is compiled into equality lookups, run with bounded
//! concurrency, and the matches are returned per request item.
//!
//! # Layout
//!
//! - [`query`]: request normalization and `type × issuer` expansion
//! - [`executor`]: bounded-concurrency lookup runner
//! - [`repository`]: the public `get` / `find` / `insert` / `delete` /
//!   `match` surface bound to one profile
//! - [`config`]: TOML configuration for the `vcstore` binary

pub mod config;
pub mod error;
pub mod executor;
pub mod query;
pub mod repository;

pub use config::{MatchingConfig, RepositoryConfig, StorageConfig, StorageMode, ROOT_KEY_ENV};
pub use error::{RootError, RootResult};
pub use executor::{ConcurrentExecutor, DEFAULT_MAX_CONCURRENCY};
pub use query::{
    Candidate, CompiledQuery, CredentialQueryItem, IssuerPolicy, QueryByExample, QueryCompiler,
    SubQuery, TrustedIssuer, QUERY_BY_EXAMPLE,
};
pub use repository::{CredentialRepository, FindFilter, RepositoryOptions};

use vcstore_core::ProfileId;
use vcstore_vault::{DocumentStore, SqliteBackend};

/// Open the SQLite-backed repository described by `config`.
///
/// Encrypted mode takes its root key from [`ROOT_KEY_ENV`].
pub async fn open_repository(
    config: &RepositoryConfig,
) -> RootResult<CredentialRepository<SqliteBackend>> {
    config.validate()?;

    if let Some(parent) = config.storage.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let path = config.storage.path.to_str().ok_or_else(|| {
        RootError::Config(format!(
            "storage.path is not valid UTF-8: {}",
            config.storage.path.display()
        ))
    })?;
    let backend = SqliteBackend::open(path)?;

    let store = match config.storage.mode {
        StorageMode::Plaintext => DocumentStore::plaintext(backend),
        StorageMode::Encrypted => {
            let keys = RepositoryConfig::root_key_from_env()?;
            DocumentStore::with_keys(backend, &keys)?
        }
    };

    let repository = CredentialRepository::open(
        store,
        ProfileId::new(config.profile_id.clone()),
        RepositoryOptions::from(&config.matching),
    )
    .await?;
    Ok(repository)
}
