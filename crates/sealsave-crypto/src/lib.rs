//! sealsave-crypto: authenticated encryption for save payloads
//!
//! Key hierarchy:
//! ```text
//! Master Key (256-bit, from a KeyProvider: keychain or Argon2id passphrase)
//!   ├── Encryption Key = HMAC-SHA256(master, "Sealsave.Encryption")
//!   └── MAC Key        = HMAC-SHA256(master, "Sealsave.HMAC")
//!
//! Envelope mode:
//! Master Key ─ derived keys ─ wrap ─▶ DEK (256-bit random, per envelope)
//!                                       └── derived keys ─ encrypt ─▶ payload
//! ```
//!
//! Payload schemes (selected by `EncryptionAlgorithm`):
//!   - AES-256-CBC + HMAC-SHA256, verify-then-decrypt
//!   - AES-256-GCM
//!   - pass-through (only with the `insecure-dev` feature)

pub mod aes_cbc_hmac;
pub mod aes_gcm;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod key_provider;
pub mod keys;
#[cfg(feature = "insecure-dev")]
pub mod null;
pub mod provider;
pub mod string;

pub use aes_cbc_hmac::AesCbcHmacProvider;
pub use aes_gcm::AesGcmProvider;
pub use envelope::Envelope;
pub use error::{CryptoError, CryptoResult};
pub use kdf::{derive_master_key, generate_salt, KdfParams, MasterKey};
pub use key_provider::{KeyProvider, KeyStore, StaticKeyProvider};
pub use keys::{derive_keys, generate_dek, DerivedKeys, SecretKey};
pub use provider::{provider_for, EncryptionProvider};
pub use string::StringCipher;

/// Size of every key in the hierarchy (256-bit)
pub const KEY_SIZE: usize = 32;

/// AES block / CBC IV size
pub const IV_SIZE: usize = 16;

/// HMAC-SHA256 output size
pub const MAC_SIZE: usize = 32;

/// AES-GCM nonce size (96-bit)
pub const GCM_NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size
pub const GCM_TAG_SIZE: usize = 16;

/// Salt length for the passphrase KDF
pub const SALT_SIZE: usize = 16;
