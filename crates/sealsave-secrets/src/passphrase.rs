//! Passphrase-derived master key
//!
//! The salt is 16 random bytes stored next to the saves. It is created on
//! first use and must survive for the key to be re-derivable; losing it
//! makes every save unreadable.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sealsave_crypto::{
    derive_master_key, generate_salt, CryptoError, CryptoResult, KdfParams, KeyProvider, MasterKey,
    SALT_SIZE,
};
use secrecy::{ExposeSecret, SecretString};

pub struct PassphraseKeyProvider {
    passphrase: SecretString,
    salt_path: PathBuf,
    params: KdfParams,
    cached: Mutex<Option<MasterKey>>,
}

impl PassphraseKeyProvider {
    pub fn new(passphrase: SecretString, salt_path: impl Into<PathBuf>, params: KdfParams) -> Self {
        Self {
            passphrase,
            salt_path: salt_path.into(),
            params,
            cached: Mutex::new(None),
        }
    }

    pub fn salt_path(&self) -> &Path {
        &self.salt_path
    }

    fn derive(&self) -> CryptoResult<MasterKey> {
        let salt = load_or_create_salt(&self.salt_path)?;
        let key = derive_master_key(&self.passphrase, &salt, &self.params)?;
        tracing::debug!(salt = %self.salt_path.display(), "derived master key from passphrase");
        Ok(key)
    }
}

impl KeyProvider for PassphraseKeyProvider {
    fn master_key(&self) -> CryptoResult<MasterKey> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| CryptoError::KeyProvider("passphrase key cache poisoned".into()))?;
        if let Some(key) = cached.as_ref() {
            return Ok(key.clone());
        }
        let key = self.derive()?;
        *cached = Some(key.clone());
        Ok(key)
    }

    fn has_master_key(&self) -> bool {
        !self.passphrase.expose_secret().is_empty()
    }
}

impl std::fmt::Debug for PassphraseKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassphraseKeyProvider")
            .field("salt_path", &self.salt_path)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Read the salt file, creating it with fresh random bytes if absent.
pub fn load_or_create_salt(path: &Path) -> CryptoResult<[u8; SALT_SIZE]> {
    match std::fs::read(path) {
        Ok(bytes) => bytes.as_slice().try_into().map_err(|_| {
            CryptoError::KeyProvider(format!(
                "salt file {} has {} bytes (expected {SALT_SIZE})",
                path.display(),
                bytes.len()
            ))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let salt = generate_salt();
            write_salt(path, &salt).map_err(|e| {
                CryptoError::KeyProvider(format!("writing salt file {}: {e}", path.display()))
            })?;
            tracing::info!(path = %path.display(), "created new passphrase salt");
            Ok(salt)
        }
        Err(e) => Err(CryptoError::KeyProvider(format!(
            "reading salt file {}: {e}",
            path.display()
        ))),
    }
}

fn write_salt(path: &Path, salt: &[u8; SALT_SIZE]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(salt)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)
}
