//! AES-256-GCM payload encryption
//!
//! Blob format (binary):
//! ```text
//! [12 bytes: random nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! The GCM tag is checked before any plaintext is released. The MAC key is
//! unused: the AEAD tag already authenticates nonce and ciphertext.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use sealsave_core::EncryptionAlgorithm;
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::SecretKey;
use crate::provider::EncryptionProvider;
use crate::{GCM_NONCE_SIZE, GCM_TAG_SIZE};

#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmProvider;

impl EncryptionProvider for AesGcmProvider {
    fn algorithm(&self) -> EncryptionAlgorithm {
        EncryptionAlgorithm::AesGcm
    }

    fn encrypt(
        &self,
        plaintext: &[u8],
        enc_key: &SecretKey,
        _mac_key: &SecretKey,
    ) -> CryptoResult<Vec<u8>> {
        let cipher = Aes256Gcm::new(enc_key.as_bytes().into());

        let mut nonce_bytes = [0u8; GCM_NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CryptoError::Encryption(format!("AES-GCM encryption failed: {e}")))?;

        let mut result = Vec::with_capacity(GCM_NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    fn decrypt(
        &self,
        blob: &[u8],
        enc_key: &SecretKey,
        _mac_key: &SecretKey,
    ) -> CryptoResult<Zeroizing<Vec<u8>>> {
        if blob.len() < GCM_NONCE_SIZE + GCM_TAG_SIZE {
            return Err(CryptoError::Format(format!(
                "blob too short: {} bytes (minimum {})",
                blob.len(),
                GCM_NONCE_SIZE + GCM_TAG_SIZE
            )));
        }

        let (nonce_bytes, ciphertext) = blob.split_at(GCM_NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);
        let cipher = Aes256Gcm::new(enc_key.as_bytes().into());

        cipher
            .decrypt(nonce, ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| {
                tracing::warn!("AES-GCM tag verification failed: save data was modified or key is wrong");
                CryptoError::Tamper
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{derive_keys, generate_dek};

    fn keys() -> (SecretKey, SecretKey) {
        let derived = derive_keys(&[5u8; 32]).unwrap();
        (derived.encryption, derived.mac)
    }

    #[test]
    fn test_roundtrip() {
        let (ek, mk) = keys();
        let blob = AesGcmProvider.encrypt(b"level 10 hero", &ek, &mk).unwrap();
        let out = AesGcmProvider.decrypt(&blob, &ek, &mk).unwrap();
        assert_eq!(out.as_slice(), b"level 10 hero");
    }

    #[test]
    fn test_empty_plaintext() {
        let (ek, mk) = keys();
        let blob = AesGcmProvider.encrypt(b"", &ek, &mk).unwrap();
        assert_eq!(blob.len(), GCM_NONCE_SIZE + GCM_TAG_SIZE);
        assert!(AesGcmProvider.decrypt(&blob, &ek, &mk).unwrap().is_empty());
    }

    #[test]
    fn test_encrypted_size() {
        let (ek, mk) = keys();
        let blob = AesGcmProvider.encrypt(&[0u8; 1000], &ek, &mk).unwrap();
        // nonce (12) + plaintext (1000) + tag (16)
        assert_eq!(blob.len(), GCM_NONCE_SIZE + 1000 + GCM_TAG_SIZE);
    }

    #[test]
    fn test_fresh_nonce() {
        let (ek, mk) = keys();
        let a = AesGcmProvider.encrypt(b"x", &ek, &mk).unwrap();
        let b = AesGcmProvider.encrypt(b"x", &ek, &mk).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tampered_ciphertext() {
        let (ek, mk) = keys();
        let mut blob = AesGcmProvider.encrypt(b"secret data", &ek, &mk).unwrap();
        blob[GCM_NONCE_SIZE + 1] ^= 0xFF;
        assert!(matches!(
            AesGcmProvider.decrypt(&blob, &ek, &mk),
            Err(CryptoError::Tamper)
        ));
    }

    #[test]
    fn test_wrong_key() {
        let (ek, mk) = keys();
        let blob = AesGcmProvider.encrypt(b"secret data", &ek, &mk).unwrap();
        assert!(matches!(
            AesGcmProvider.decrypt(&blob, &generate_dek(), &mk),
            Err(CryptoError::Tamper)
        ));
    }

    #[test]
    fn test_truncated() {
        let (ek, mk) = keys();
        assert!(matches!(
            AesGcmProvider.decrypt(&[0u8; GCM_NONCE_SIZE + GCM_TAG_SIZE - 1], &ek, &mk),
            Err(CryptoError::Format(_))
        ));
    }
}
