//! Key provider selection from configuration

use std::path::Path;

use sealsave_core::config::{KeyConfig, KeyProviderKind};
use sealsave_crypto::{CryptoError, CryptoResult, KdfParams, KeyProvider};
use secrecy::SecretString;

use crate::keychain::KeychainKeyStore;
use crate::passphrase::PassphraseKeyProvider;

/// Argon2id parameters from the `[keys]` config section.
pub fn kdf_params(config: &KeyConfig) -> KdfParams {
    KdfParams {
        mem_cost_kib: config.argon2_mem_cost_kib,
        time_cost: config.argon2_time_cost,
        parallelism: config.argon2_parallelism,
    }
}

/// Build the master key provider for this platform.
///
/// `Auto` prefers the OS keychain when it already holds a key and falls back
/// to the passphrase provider otherwise. `passphrase` is only called when the
/// passphrase provider is actually chosen.
pub fn platform_key_provider<F>(
    config: &KeyConfig,
    salt_path: &Path,
    passphrase: F,
) -> CryptoResult<Box<dyn KeyProvider>>
where
    F: FnOnce() -> CryptoResult<SecretString>,
{
    let keychain = || KeychainKeyStore::new(&config.keychain_service, &config.keychain_account);
    let from_passphrase = |passphrase: F| -> CryptoResult<Box<dyn KeyProvider>> {
        let provider = PassphraseKeyProvider::new(passphrase()?, salt_path, kdf_params(config));
        if !provider.has_master_key() {
            return Err(CryptoError::KeyProvider("passphrase must not be empty".into()));
        }
        Ok(Box::new(provider))
    };

    match config.provider {
        KeyProviderKind::Keychain => {
            tracing::debug!("using platform keychain key provider");
            Ok(Box::new(keychain()))
        }
        KeyProviderKind::Passphrase => {
            tracing::debug!(salt = %salt_path.display(), "using passphrase key provider");
            from_passphrase(passphrase)
        }
        KeyProviderKind::Auto => {
            let store = keychain();
            if store.is_available() && store.has_master_key() {
                tracing::debug!("auto: platform keychain holds a master key");
                Ok(Box::new(store))
            } else {
                tracing::debug!("auto: no keychain key, falling back to passphrase");
                from_passphrase(passphrase)
            }
        }
    }
}
