//! Platform keychain storage for the master key.
//!
//! Uses the `keyring` crate for cross-platform access:
//! - macOS: Keychain Services
//! - Linux: kernel keyutils (persists for the login session)
//! - Windows: Credential Manager (DPAPI)
//!
//! The key is stored base64-encoded under `(service, account)`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sealsave_crypto::{CryptoError, CryptoResult, KeyProvider, KeyStore, MasterKey, KEY_SIZE};
use zeroize::{Zeroize, Zeroizing};

#[derive(Debug, Clone)]
pub struct KeychainKeyStore {
    service: String,
    account: String,
}

impl KeychainKeyStore {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> CryptoResult<keyring::Entry> {
        keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| CryptoError::KeyProvider(format!("keychain entry creation: {e}")))
    }

    /// Whether a platform keychain backend can be reached.
    pub fn is_available(&self) -> bool {
        self.entry().is_ok()
    }

    /// Create a fresh random master key, store it, and return it.
    pub fn generate_master_key(&self) -> CryptoResult<MasterKey> {
        let key = MasterKey::generate();
        self.store_master_key(&key)?;
        tracing::info!(
            service = %self.service,
            account = %self.account,
            "generated new master key in platform keychain"
        );
        Ok(key)
    }
}

impl KeyProvider for KeychainKeyStore {
    fn master_key(&self) -> CryptoResult<MasterKey> {
        match self.entry()?.get_password() {
            Ok(mut encoded) => {
                let key = decode_master_key(&encoded);
                encoded.zeroize();
                key
            }
            Err(keyring::Error::NoEntry) => Err(CryptoError::KeyProvider(format!(
                "no master key in keychain for '{}/{}' (run `sealsave key init`)",
                self.service, self.account
            ))),
            Err(e) => Err(CryptoError::KeyProvider(format!(
                "keychain get for '{}/{}': {e}",
                self.service, self.account
            ))),
        }
    }

    fn has_master_key(&self) -> bool {
        self.entry()
            .and_then(|entry| {
                entry
                    .get_password()
                    .map(|mut p| p.zeroize())
                    .map_err(|e| CryptoError::KeyProvider(e.to_string()))
            })
            .is_ok()
    }
}

impl KeyStore for KeychainKeyStore {
    fn store_master_key(&self, key: &MasterKey) -> CryptoResult<()> {
        let encoded = Zeroizing::new(STANDARD.encode(key.as_bytes()));
        self.entry()?
            .set_password(&encoded)
            .map_err(|e| CryptoError::KeyProvider(format!("keychain store: {e}")))?;
        tracing::debug!(account = %self.account, "stored master key in platform keychain");
        Ok(())
    }

    fn delete_master_key(&self) -> CryptoResult<()> {
        match self.entry()?.delete_credential() {
            Ok(()) => {
                tracing::debug!(account = %self.account, "deleted master key from platform keychain");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(CryptoError::KeyProvider(format!("keychain delete: {e}"))),
        }
    }
}

fn decode_master_key(encoded: &str) -> CryptoResult<MasterKey> {
    let raw = Zeroizing::new(
        STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::KeyProvider(format!("keychain master key: base64 decode: {e}")))?,
    );
    let bytes: [u8; KEY_SIZE] = raw.as_slice().try_into().map_err(|_| {
        CryptoError::InvalidKey(format!(
            "keychain master key has {} bytes (expected {KEY_SIZE})",
            raw.len()
        ))
    })?;
    Ok(MasterKey::from_bytes(bytes))
}
