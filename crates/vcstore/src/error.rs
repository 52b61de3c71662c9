use thiserror::Error;

/// Error type for the vcstore binary and configuration layer, aggregating
/// errors from the store crates.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("store error: {0}")]
    Store(#[from] vcstore_core::StoreError),

    #[error("vault error: {0}")]
    Vault(#[from] vcstore_vault::VaultError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RootError {
    fn from(e: serde_json::Error) -> Self {
        RootError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;

#[cfg(test)]
mod tests {
    use super::*;
    use vcstore_core::StoreError;

    #[test]
    fn test_root_error_config() {
        let err = RootError::Config("profile_id must not be empty".into());
        assert_eq!(
            err.to_string(),
            "configuration error: profile_id must not be empty"
        );
    }

    #[test]
    fn test_root_error_from_store() {
        let err: RootError = StoreError::NotFound("urn:1".into()).into();
        assert!(matches!(err, RootError::Store(StoreError::NotFound(_))));
        assert!(err.to_string().contains("urn:1"));
    }

    #[test]
    fn test_root_error_from_vault() {
        let err: RootError = vcstore_vault::VaultError::InvalidKey("short".into()).into();
        assert!(err.to_string().contains("short"));
    }

    #[test]
    fn test_root_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let root_err: RootError = json_err.into();
        assert!(matches!(root_err, RootError::Serialization(_)));
    }

    #[test]
    fn test_root_error_from_toml() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let root_err: RootError = toml_err.into();
        assert!(matches!(root_err, RootError::Config(_)));
    }
}
