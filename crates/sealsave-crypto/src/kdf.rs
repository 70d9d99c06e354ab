//! Master key type and the Argon2id passphrase KDF

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::{KEY_SIZE, SALT_SIZE};

/// The 256-bit top-level secret handed out by a `KeyProvider`.
///
/// Never persisted inside a container. Zeroized on drop, so every copy a
/// provider hands out is wiped when the caller lets go of it.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Generate a fresh random master key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Argon2id parameters for KDF
#[derive(Debug, Clone)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Generate a random KDF salt.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derive a 256-bit master key from a passphrase and salt using Argon2id.
///
/// The salt should be 16 bytes, randomly generated and persisted next to the
/// save directory (it does not need to be secret).
pub fn derive_master_key(
    passphrase: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> CryptoResult<MasterKey> {
    if passphrase.expose_secret().is_empty() {
        return Err(CryptoError::InvalidKey("passphrase must not be empty".into()));
    }

    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::InvalidKey(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::KeyProvider(format!("Argon2id KDF failed: {e}")))?;

    let master = MasterKey::from_bytes(key);
    key.zeroize();
    Ok(master)
}
