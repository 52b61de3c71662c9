use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("decryption error: {0}")]
    Decryption(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<VaultError> for vcstore_core::StoreError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::Storage(msg) => vcstore_core::StoreError::Backend(msg),
            VaultError::Serialization(msg) => vcstore_core::StoreError::Serialization(msg),
            other => vcstore_core::StoreError::Crypto(other.to_string()),
        }
    }
}

pub type VaultResult<T> = Result<T, VaultError>;
