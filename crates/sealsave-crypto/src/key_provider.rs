//! Master key source abstraction
//!
//! Concrete platform and passphrase providers live in `sealsave-secrets`.

use std::sync::Arc;

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::MasterKey;

/// Supplies the master key for one save/load operation.
pub trait KeyProvider: Send + Sync {
    /// Return a fresh copy of the master key. The copy is wiped when dropped.
    fn master_key(&self) -> CryptoResult<MasterKey>;

    /// Whether a master key is available without further setup.
    fn has_master_key(&self) -> bool;
}

/// A key provider backed by mutable storage (OS keychain and similar).
pub trait KeyStore: KeyProvider {
    fn store_master_key(&self, key: &MasterKey) -> CryptoResult<()>;

    fn delete_master_key(&self) -> CryptoResult<()>;
}

impl<P: KeyProvider + ?Sized> KeyProvider for Arc<P> {
    fn master_key(&self) -> CryptoResult<MasterKey> {
        (**self).master_key()
    }

    fn has_master_key(&self) -> bool {
        (**self).has_master_key()
    }
}

impl<P: KeyProvider + ?Sized> KeyProvider for Box<P> {
    fn master_key(&self) -> CryptoResult<MasterKey> {
        (**self).master_key()
    }

    fn has_master_key(&self) -> bool {
        (**self).has_master_key()
    }
}

/// Holds a master key in memory for the lifetime of the provider.
#[derive(Debug, Default)]
pub struct StaticKeyProvider {
    key: Option<MasterKey>,
}

impl StaticKeyProvider {
    pub fn new(key: MasterKey) -> Self {
        Self { key: Some(key) }
    }

    /// A provider with no key; `master_key()` fails.
    pub fn empty() -> Self {
        Self { key: None }
    }
}

impl KeyProvider for StaticKeyProvider {
    fn master_key(&self) -> CryptoResult<MasterKey> {
        self.key
            .clone()
            .ok_or_else(|| CryptoError::KeyProvider("no master key configured".into()))
    }

    fn has_master_key(&self) -> bool {
        self.key.is_some()
    }
}
