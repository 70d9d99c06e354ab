//! Sub-key derivation and the DEK

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::KEY_SIZE;

type HmacSha256 = Hmac<Sha256>;

/// Domain-separation context for the payload encryption key.
pub const ENCRYPTION_CONTEXT: &[u8] = b"Sealsave.Encryption";

/// Domain-separation context for the MAC key.
pub const MAC_CONTEXT: &[u8] = b"Sealsave.HMAC";

/// A 256-bit symmetric key. Zeroized on drop.
#[derive(Clone)]
pub struct SecretKey {
    bytes: [u8; KEY_SIZE],
}

impl SecretKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Copy a key out of a slice, rejecting anything that is not exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "key has wrong size: {} bytes (expected {KEY_SIZE})",
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// The encryption/MAC sub-key pair derived from one parent key.
#[derive(Debug, Clone)]
pub struct DerivedKeys {
    pub encryption: SecretKey,
    pub mac: SecretKey,
}

/// Expand a parent key (master key or DEK) into independent encryption and MAC keys.
///
/// `encryption = HMAC-SHA256(key, "Sealsave.Encryption")`,
/// `mac = HMAC-SHA256(key, "Sealsave.HMAC")`. Deterministic for a given parent.
pub fn derive_keys(parent: &[u8]) -> CryptoResult<DerivedKeys> {
    if parent.is_empty() {
        return Err(CryptoError::InvalidKey(
            "parent key must not be empty".into(),
        ));
    }
    Ok(DerivedKeys {
        encryption: derive_subkey(parent, ENCRYPTION_CONTEXT)?,
        mac: derive_subkey(parent, MAC_CONTEXT)?,
    })
}

/// Keyed one-way derivation of a single 32-byte sub-key for `context`.
pub fn derive_subkey(parent: &[u8], context: &[u8]) -> CryptoResult<SecretKey> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(parent)
        .map_err(|e| CryptoError::InvalidKey(format!("HMAC init failed: {e}")))?;
    mac.update(context);
    let mut out: [u8; KEY_SIZE] = mac.finalize().into_bytes().into();
    let key = SecretKey::from_bytes(out);
    out.zeroize();
    Ok(key)
}

/// Generate a random 256-bit data encryption key.
pub fn generate_dek() -> SecretKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    SecretKey::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_dek_generation() {
        let k1 = generate_dek();
        let k2 = generate_dek();
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");
    }

    #[test]
    fn test_derive_keys_deterministic() {
        let master = [42u8; KEY_SIZE];
        let a = derive_keys(&master).unwrap();
        let b = derive_keys(&master).unwrap();
        assert_eq!(a.encryption.as_bytes(), b.encryption.as_bytes());
        assert_eq!(a.mac.as_bytes(), b.mac.as_bytes());
    }

    #[test]
    fn test_contexts_separate_keys() {
        let keys = derive_keys(&[7u8; KEY_SIZE]).unwrap();
        assert_ne!(
            keys.encryption.as_bytes(),
            keys.mac.as_bytes(),
            "different domains must produce different keys"
        );
    }

    #[test]
    fn test_derive_matches_hmac_sha256() {
        let master = [1u8; KEY_SIZE];
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&master).unwrap();
        mac.update(b"Sealsave.Encryption");
        let expected: [u8; KEY_SIZE] = mac.finalize().into_bytes().into();

        let keys = derive_keys(&master).unwrap();
        assert_eq!(keys.encryption.as_bytes(), &expected);
    }

    #[test]
    fn test_empty_parent_rejected() {
        assert!(matches!(derive_keys(&[]), Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn test_from_slice_length_check() {
        assert!(SecretKey::from_slice(&[0u8; 31]).is_err());
        assert!(SecretKey::from_slice(&[0u8; 33]).is_err());
        assert!(SecretKey::from_slice(&[0u8; 32]).is_ok());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SecretKey::from_bytes([0xAB; KEY_SIZE]);
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("171"));
    }

    proptest! {
        #[test]
        fn different_masters_different_subkeys(
            a in any::<[u8; KEY_SIZE]>(),
            b in any::<[u8; KEY_SIZE]>(),
        ) {
            prop_assume!(a != b);
            let ka = derive_keys(&a).unwrap();
            let kb = derive_keys(&b).unwrap();
            prop_assert_ne!(ka.encryption.as_bytes(), kb.encryption.as_bytes());
            prop_assert_ne!(ka.mac.as_bytes(), kb.mac.as_bytes());
        }
    }
}
