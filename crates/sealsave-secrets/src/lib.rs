//! sealsave-secrets: where the master key comes from
//!
//! Provider selection (`platform_key_provider`):
//!   1. OS keychain entry, when configured or when it already holds a key
//!   2. Argon2id over a passphrase with a persisted random salt

pub mod keychain;
pub mod passphrase;
pub mod platform;

pub use keychain::KeychainKeyStore;
pub use passphrase::PassphraseKeyProvider;
pub use platform::{kdf_params, platform_key_provider};
