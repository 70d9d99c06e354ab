//! AES-256-CBC + HMAC-SHA256 (encrypt-then-MAC)
//!
//! Blob format (binary):
//! ```text
//! [16 bytes: random IV][N bytes: AES-256-CBC ciphertext, PKCS#7][32 bytes: HMAC-SHA256]
//! MAC = HMAC-SHA256(mac_key, IV || ciphertext)
//! ```
//!
//! The MAC is checked in constant time before the block cipher ever sees
//! the ciphertext.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sealsave_core::EncryptionAlgorithm;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::SecretKey;
use crate::provider::EncryptionProvider;
use crate::{IV_SIZE, MAC_SIZE};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, Default)]
pub struct AesCbcHmacProvider;

impl AesCbcHmacProvider {
    fn mac(mac_key: &SecretKey, authenticated: &[u8]) -> CryptoResult<HmacSha256> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key.as_bytes())
            .map_err(|e| CryptoError::InvalidKey(format!("HMAC init failed: {e}")))?;
        mac.update(authenticated);
        Ok(mac)
    }
}

impl EncryptionProvider for AesCbcHmacProvider {
    fn algorithm(&self) -> EncryptionAlgorithm {
        EncryptionAlgorithm::AesCbcHmac
    }

    fn encrypt(
        &self,
        plaintext: &[u8],
        enc_key: &SecretKey,
        mac_key: &SecretKey,
    ) -> CryptoResult<Vec<u8>> {
        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new_from_slices(enc_key.as_bytes(), &iv)
            .map_err(|e| CryptoError::InvalidKey(format!("AES-CBC init failed: {e}")))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut blob = Vec::with_capacity(IV_SIZE + ciphertext.len() + MAC_SIZE);
        blob.extend_from_slice(&iv);
        blob.extend_from_slice(&ciphertext);

        let tag = Self::mac(mac_key, &blob)?.finalize().into_bytes();
        blob.extend_from_slice(&tag);
        Ok(blob)
    }

    fn decrypt(
        &self,
        blob: &[u8],
        enc_key: &SecretKey,
        mac_key: &SecretKey,
    ) -> CryptoResult<Zeroizing<Vec<u8>>> {
        if blob.len() < IV_SIZE + MAC_SIZE + 1 {
            return Err(CryptoError::Format(format!(
                "blob too short: {} bytes (minimum {})",
                blob.len(),
                IV_SIZE + MAC_SIZE + 1
            )));
        }

        let (authenticated, stored_mac) = blob.split_at(blob.len() - MAC_SIZE);

        // Verify first; no decryption on failure.
        if Self::mac(mac_key, authenticated)?
            .verify_slice(stored_mac)
            .is_err()
        {
            tracing::warn!("HMAC verification failed: save data was modified or key is wrong");
            return Err(CryptoError::Tamper);
        }

        let (iv, ciphertext) = authenticated.split_at(IV_SIZE);
        let plaintext = Aes256CbcDec::new_from_slices(enc_key.as_bytes(), iv)
            .map_err(|e| CryptoError::InvalidKey(format!("AES-CBC init failed: {e}")))?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CryptoError::Encryption("decryption failed: bad padding".into()))?;

        Ok(Zeroizing::new(plaintext))
    }
}
