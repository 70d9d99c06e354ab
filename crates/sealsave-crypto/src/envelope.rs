//! Envelope encryption
//!
//! Each envelope carries its own random DEK. The payload is encrypted under
//! keys derived from the DEK; the DEK itself is wrapped under keys derived
//! from the master key. Rotating the master key re-wraps the DEK and leaves
//! `encrypted_data` untouched.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::MasterKey;
use crate::key_provider::KeyProvider;
use crate::keys::{derive_keys, generate_dek, SecretKey};
use crate::provider::EncryptionProvider;

/// Envelope JSON format version
const ENVELOPE_VERSION: u32 = 1;

/// A wrapped DEK and the payload encrypted under it.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    pub wrapped_dek: Vec<u8>,
    pub encrypted_data: Vec<u8>,
}

/// On-disk / on-wire form with base64 fields
#[derive(Serialize, Deserialize)]
struct EnvelopeJson {
    version: u32,
    wrapped_dek: String,
    encrypted_data: String,
}

impl Envelope {
    /// Encrypt `plaintext` under a fresh DEK wrapped by the provider's master key.
    pub fn encrypt(
        plaintext: &[u8],
        keys: &dyn KeyProvider,
        provider: &dyn EncryptionProvider,
    ) -> CryptoResult<Self> {
        let dek = generate_dek();
        let encrypted_data = {
            let data_keys = derive_keys(dek.as_bytes())?;
            provider.encrypt(plaintext, &data_keys.encryption, &data_keys.mac)?
        };
        let wrapped_dek = wrap_dek(&dek, &keys.master_key()?, provider)?;

        Ok(Self {
            wrapped_dek,
            encrypted_data,
        })
    }

    /// Unwrap the DEK and decrypt the payload.
    ///
    /// A modified wrapper or a wrong master key fails with [`CryptoError::Tamper`]
    /// before the payload is touched.
    pub fn decrypt(
        &self,
        keys: &dyn KeyProvider,
        provider: &dyn EncryptionProvider,
    ) -> CryptoResult<Zeroizing<Vec<u8>>> {
        let dek = unwrap_dek(&self.wrapped_dek, &keys.master_key()?, provider)?;
        let data_keys = derive_keys(dek.as_bytes())?;
        provider.decrypt(&self.encrypted_data, &data_keys.encryption, &data_keys.mac)
    }

    /// Re-wrap the DEK under `new_keys`. `encrypted_data` is copied unchanged.
    pub fn rotate_key(
        &self,
        old_keys: &dyn KeyProvider,
        new_keys: &dyn KeyProvider,
        provider: &dyn EncryptionProvider,
    ) -> CryptoResult<Self> {
        let dek = unwrap_dek(&self.wrapped_dek, &old_keys.master_key()?, provider)?;
        let wrapped_dek = wrap_dek(&dek, &new_keys.master_key()?, provider)?;
        tracing::debug!(
            payload_bytes = self.encrypted_data.len(),
            "envelope DEK re-wrapped under new master key"
        );

        Ok(Self {
            wrapped_dek,
            encrypted_data: self.encrypted_data.clone(),
        })
    }

    /// Serialize to JSON bytes
    pub fn to_json(&self) -> CryptoResult<Vec<u8>> {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;

        serde_json::to_vec(&EnvelopeJson {
            version: ENVELOPE_VERSION,
            wrapped_dek: STANDARD.encode(&self.wrapped_dek),
            encrypted_data: STANDARD.encode(&self.encrypted_data),
        })
        .map_err(|e| CryptoError::Format(format!("envelope serialization: {e}")))
    }

    /// Deserialize from JSON bytes
    pub fn from_json(data: &[u8]) -> CryptoResult<Self> {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;

        let json: EnvelopeJson = serde_json::from_slice(data)
            .map_err(|e| CryptoError::Format(format!("envelope deserialization: {e}")))?;
        if json.version != ENVELOPE_VERSION {
            return Err(CryptoError::Unsupported(format!(
                "envelope version {}",
                json.version
            )));
        }

        let decode = |field: &str, s: &str| {
            STANDARD
                .decode(s)
                .map_err(|e| CryptoError::Format(format!("{field}: base64 decode: {e}")))
        };
        Ok(Self {
            wrapped_dek: decode("wrapped_dek", &json.wrapped_dek)?,
            encrypted_data: decode("encrypted_data", &json.encrypted_data)?,
        })
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("wrapped_dek_len", &self.wrapped_dek.len())
            .field("encrypted_data_len", &self.encrypted_data.len())
            .finish()
    }
}

fn wrap_dek(
    dek: &SecretKey,
    master: &MasterKey,
    provider: &dyn EncryptionProvider,
) -> CryptoResult<Vec<u8>> {
    let wrap_keys = derive_keys(master.as_bytes())?;
    provider.encrypt(dek.as_bytes(), &wrap_keys.encryption, &wrap_keys.mac)
}

fn unwrap_dek(
    wrapped: &[u8],
    master: &MasterKey,
    provider: &dyn EncryptionProvider,
) -> CryptoResult<SecretKey> {
    let wrap_keys = derive_keys(master.as_bytes())?;
    let raw = provider.decrypt(wrapped, &wrap_keys.encryption, &wrap_keys.mac)?;
    SecretKey::from_slice(&raw)
}
