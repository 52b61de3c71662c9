use crate::error::{VaultError, VaultResult};
use crate::key_hierarchy::{document_dek, KeyHierarchy};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce as AesNonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vcstore_core::{DocumentCipher, StoreError, StoreResult};
use zeroize::Zeroizing;

// AES-256-GCM envelope encryption.
//
// Each document is encrypted with its own Data Encryption Key (DEK), derived
// from the sealing key and a random salt that travels in the envelope. The
// nonce is randomly generated per-encryption and stored alongside the
// ciphertext.

const NONCE_SIZE: usize = 12; // AES-GCM standard nonce size
const SALT_SIZE: usize = 16;
const ALGORITHM: &str = "A256GCM";

/// Encrypted envelope as persisted in a document's `jwe` field.
/// Binary fields are base64url without padding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub kid: String,
    pub alg: String,
    pub salt: String,
    pub nonce: String,
    pub ciphertext: String,
}

/// Encrypt plaintext using AES-256-GCM with the given key.
/// Returns `(nonce, ciphertext)`; the ciphertext includes the GCM tag.
pub fn encrypt(
    key: &Zeroizing<[u8; 32]>,
    plaintext: &[u8],
) -> VaultResult<([u8; NONCE_SIZE], Vec<u8>)> {
    let cipher = Aes256Gcm::new_from_slice(&**key)
        .map_err(|e| VaultError::Encryption(format!("cipher init failed: {}", e)))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = AesNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| VaultError::Encryption(format!("encryption failed: {}", e)))?;

    Ok((nonce_bytes, ciphertext))
}

/// Decrypt AES-256-GCM ciphertext with the given key and nonce.
pub fn decrypt(key: &Zeroizing<[u8; 32]>, nonce: &[u8], ciphertext: &[u8]) -> VaultResult<Vec<u8>> {
    if nonce.len() != NONCE_SIZE {
        return Err(VaultError::Decryption(format!(
            "nonce must be {} bytes, got {}",
            NONCE_SIZE,
            nonce.len()
        )));
    }
    let cipher = Aes256Gcm::new_from_slice(&**key)
        .map_err(|e| VaultError::Decryption(format!("cipher init failed: {}", e)))?;

    cipher
        .decrypt(AesNonce::from_slice(nonce), ciphertext)
        .map_err(|e| VaultError::Decryption(format!("decryption failed: {}", e)))
}

// ---------------------------------------------------------------------------
// EnvelopeCipher: DocumentCipher over the sealing key
// ---------------------------------------------------------------------------

pub struct EnvelopeCipher {
    kid: String,
    sealing_key: Zeroizing<[u8; 32]>,
}

impl EnvelopeCipher {
    pub fn new(kid: impl Into<String>, sealing_key: Zeroizing<[u8; 32]>) -> Self {
        Self {
            kid: kid.into(),
            sealing_key,
        }
    }

    pub fn from_hierarchy(keys: &KeyHierarchy) -> VaultResult<Self> {
        Ok(Self::new(keys.sealing_kid()?, keys.sealing_key()?))
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn seal_envelope(&self, plaintext: &[u8]) -> VaultResult<EncryptedEnvelope> {
        let mut salt = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let dek = document_dek(&*self.sealing_key, &salt)?;
        let (nonce, ciphertext) = encrypt(&dek, plaintext)?;

        Ok(EncryptedEnvelope {
            kid: self.kid.clone(),
            alg: ALGORITHM.into(),
            salt: URL_SAFE_NO_PAD.encode(salt),
            nonce: URL_SAFE_NO_PAD.encode(nonce),
            ciphertext: URL_SAFE_NO_PAD.encode(ciphertext),
        })
    }

    pub fn open_envelope(&self, envelope: &EncryptedEnvelope) -> VaultResult<Vec<u8>> {
        if envelope.kid != self.kid {
            return Err(VaultError::Decryption(format!(
                "envelope sealed under unknown key {}",
                envelope.kid
            )));
        }
        if envelope.alg != ALGORITHM {
            return Err(VaultError::Decryption(format!(
                "unsupported envelope algorithm {}",
                envelope.alg
            )));
        }
        let salt = decode_field("salt", &envelope.salt)?;
        let nonce = decode_field("nonce", &envelope.nonce)?;
        let ciphertext = decode_field("ciphertext", &envelope.ciphertext)?;

        let dek = document_dek(&*self.sealing_key, &salt)?;
        decrypt(&dek, &nonce, &ciphertext)
    }
}

fn decode_field(name: &str, encoded: &str) -> VaultResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| VaultError::Decryption(format!("envelope {} is not base64url: {}", name, e)))
}

impl DocumentCipher for EnvelopeCipher {
    fn seal(&self, plaintext: &[u8]) -> StoreResult<Value> {
        let envelope = self.seal_envelope(plaintext)?;
        serde_json::to_value(envelope)
            .map_err(|e| StoreError::Serialization(format!("failed to serialize envelope: {}", e)))
    }

    fn open(&self, sealed: &Value) -> StoreResult<Vec<u8>> {
        let envelope: EncryptedEnvelope = serde_json::from_value(sealed.clone()).map_err(|e| {
            StoreError::Crypto(format!("failed to deserialize envelope: {}", e))
        })?;
        Ok(self.open_envelope(&envelope)?)
    }
}
