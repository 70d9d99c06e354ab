//! Encrypt short UTF-8 strings to base64 text

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::MasterKey;
use crate::keys::{derive_keys, DerivedKeys};
use crate::provider::EncryptionProvider;

/// String encryption bound to one master key and provider.
pub struct StringCipher {
    keys: DerivedKeys,
    provider: Box<dyn EncryptionProvider>,
}

impl StringCipher {
    pub fn new(master: &MasterKey, provider: Box<dyn EncryptionProvider>) -> CryptoResult<Self> {
        Ok(Self {
            keys: derive_keys(master.as_bytes())?,
            provider,
        })
    }

    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        let blob = self
            .provider
            .encrypt(plaintext.as_bytes(), &self.keys.encryption, &self.keys.mac)?;
        Ok(STANDARD.encode(blob))
    }

    pub fn decrypt(&self, encoded: &str) -> CryptoResult<String> {
        let blob = STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::Format(format!("base64 decode: {e}")))?;
        let plaintext = self
            .provider
            .decrypt(&blob, &self.keys.encryption, &self.keys.mac)?;
        String::from_utf8(plaintext.to_vec())
            .map_err(|e| CryptoError::Format(format!("decrypted string is not UTF-8: {e}")))
    }
}

impl std::fmt::Debug for StringCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StringCipher")
            .field("algorithm", &self.provider.algorithm())
            .finish_non_exhaustive()
    }
}
