use crate::error::{VaultError, VaultResult};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Keys for one encrypted store, all derived from a single root key:
///
/// ```text
/// RootKey
///   → IndexKey   (HKDF from root + "blind-index")   : HMAC key for blind index tokens
///   → SealingKey (HKDF from root + "document-seal") : parent of per-document DEKs
///       → DocumentDek (HKDF from SealingKey + random salt)
/// ```
///
/// The index key and the sealing key are independent: holding index tokens
/// gives no way to open an envelope, and the reverse.
pub struct KeyHierarchy {
    root_key: Zeroizing<[u8; 32]>,
}

impl KeyHierarchy {
    pub fn from_raw_key(key: [u8; 32]) -> Self {
        Self {
            root_key: Zeroizing::new(key),
        }
    }

    /// Parse a 64-character hex root key.
    pub fn from_hex(hex_key: &str) -> VaultResult<Self> {
        let bytes = Zeroizing::new(
            hex::decode(hex_key.trim())
                .map_err(|e| VaultError::InvalidKey(format!("root key is not hex: {}", e)))?,
        );
        let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            VaultError::InvalidKey(format!(
                "root key must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self::from_raw_key(key))
    }

    /// Fresh random root key.
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self::from_raw_key(key)
    }

    /// Hex encoding of the root key, for handing to an operator once.
    pub fn root_key_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(*self.root_key))
    }

    /// HMAC key for blind index tokens.
    pub fn index_key(&self) -> VaultResult<Zeroizing<[u8; 32]>> {
        hkdf_derive(&*self.root_key, b"blind-index", b"vcstore-index-key")
    }

    /// Parent key for per-document encryption keys.
    pub fn sealing_key(&self) -> VaultResult<Zeroizing<[u8; 32]>> {
        hkdf_derive(&*self.root_key, b"document-seal", b"vcstore-sealing-key")
    }

    /// Public identifier of the index key: `urn:vcstore:hmac:<fingerprint>`.
    pub fn index_id(&self) -> VaultResult<String> {
        Ok(format!(
            "urn:vcstore:hmac:{}",
            fingerprint(&*self.index_key()?)
        ))
    }

    /// Public identifier of the sealing key, recorded in every envelope.
    pub fn sealing_kid(&self) -> VaultResult<String> {
        Ok(format!(
            "urn:vcstore:seal:{}",
            fingerprint(&*self.sealing_key()?)
        ))
    }
}

/// Per-document DEK: HKDF(sealing_key, salt).
pub fn document_dek(sealing_key: &[u8], salt: &[u8]) -> VaultResult<Zeroizing<[u8; 32]>> {
    hkdf_derive(sealing_key, salt, b"vcstore-document-dek")
}

/// First 8 bytes of SHA-256, hex encoded.
fn fingerprint(key: &[u8]) -> String {
    let hash = Sha256::digest(key);
    hex::encode(&hash[..8])
}

/// HKDF-SHA256 key derivation.
fn hkdf_derive(ikm: &[u8], salt: &[u8], info: &[u8]) -> VaultResult<Zeroizing<[u8; 32]>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = [0u8; 32];
    hk.expand(info, &mut okm)
        .map_err(|e| VaultError::KeyDerivation(format!("HKDF expand failed: {}", e)))?;
    Ok(Zeroizing::new(okm))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_hierarchy() -> KeyHierarchy {
        KeyHierarchy::from_raw_key([0x42; 32])
    }

    #[test]
    fn test_derivation_deterministic() {
        let h1 = test_hierarchy();
        let h2 = test_hierarchy();
        assert_eq!(*h1.index_key().unwrap(), *h2.index_key().unwrap());
        assert_eq!(*h1.sealing_key().unwrap(), *h2.sealing_key().unwrap());
        assert_eq!(h1.index_id().unwrap(), h2.index_id().unwrap());
    }

    #[test]
    fn test_index_and_sealing_keys_independent() {
        let h = test_hierarchy();
        assert_ne!(*h.index_key().unwrap(), *h.sealing_key().unwrap());
    }

    #[test]
    fn test_different_roots_differ() {
        let h1 = KeyHierarchy::from_raw_key([0x01; 32]);
        let h2 = KeyHierarchy::from_raw_key([0x02; 32]);
        assert_ne!(*h1.index_key().unwrap(), *h2.index_key().unwrap());
        assert_ne!(h1.sealing_kid().unwrap(), h2.sealing_kid().unwrap());
    }

    #[test]
    fn test_index_id_format() {
        let id = test_hierarchy().index_id().unwrap();
        assert!(id.starts_with("urn:vcstore:hmac:"));
        assert_eq!(id.len(), "urn:vcstore:hmac:".len() + 16);
    }

    #[test]
    fn test_from_hex_roundtrip() {
        let h = KeyHierarchy::generate();
        let restored = KeyHierarchy::from_hex(&h.root_key_hex()).unwrap();
        assert_eq!(*h.index_key().unwrap(), *restored.index_key().unwrap());
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(matches!(
            KeyHierarchy::from_hex("not-hex"),
            Err(VaultError::InvalidKey(_))
        ));
        assert!(matches!(
            KeyHierarchy::from_hex("abcd"),
            Err(VaultError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_document_dek_differs_by_salt() {
        let sk = test_hierarchy().sealing_key().unwrap();
        let k1 = document_dek(&*sk, b"salt-1").unwrap();
        let k2 = document_dek(&*sk, b"salt-2").unwrap();
        assert_ne!(*k1, *k2);
    }
}
