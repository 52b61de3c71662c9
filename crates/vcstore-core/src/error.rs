use thiserror::Error;

/// Error taxonomy shared by the store façade, the query engine and the
/// repository surface.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A lookup found nothing where the caller expected a document.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed credential or query shape.
    #[error("validation error: {0}")]
    Validation(String),

    /// A recognized query feature that is not implemented.
    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("unsupported query type: {0}")]
    UnsupportedQueryType(String),

    /// A required parameter was missing or empty.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Stable kind name, used by the CLI when reporting failures.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "NotFoundError",
            StoreError::Validation(_) => "ValidationError",
            StoreError::NotSupported(_) => "NotSupportedError",
            StoreError::UnsupportedQueryType(_) => "UnsupportedQueryType",
            StoreError::InvalidArgument(_) => "InvalidArgument",
            StoreError::Backend(_) => "BackendError",
            StoreError::Crypto(_) => "CryptoError",
            StoreError::Serialization(_) => "SerializationError",
            StoreError::Internal(_) => "InternalError",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::NotSupported("trusted issuer {} has no id".into());
        assert_eq!(
            err.to_string(),
            "not supported: trusted issuer {} has no id"
        );
    }

    #[test]
    fn test_error_kind_names() {
        assert_eq!(StoreError::NotFound("x".into()).kind(), "NotFoundError");
        assert_eq!(StoreError::Validation("x".into()).kind(), "ValidationError");
        assert_eq!(
            StoreError::UnsupportedQueryType("x".into()).kind(),
            "UnsupportedQueryType"
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(StoreError::NotFound("doc".into()).is_not_found());
        assert!(!StoreError::Backend("io".into()).is_not_found());
    }

    #[test]
    fn test_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: StoreError = json_err.into();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
