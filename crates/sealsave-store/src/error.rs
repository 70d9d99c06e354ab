use std::path::PathBuf;

use sealsave_core::CoreError;
use sealsave_crypto::CryptoError;
use thiserror::Error;

pub type SaveResult<T> = Result<T, SaveError>;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("save version {file_version} is older than the minimum supported version {min_supported}")]
    UnsupportedVersion { file_version: u16, min_supported: u16 },

    #[error("save version {file_version} is newer than this build (current version {current})")]
    NewerVersion { file_version: u16, current: u16 },

    #[error("no migration registered from version {from} to {to}")]
    MissingMigration { from: u16, to: u16 },

    #[error("migration from version {from} to {to} failed: {source}")]
    Failed {
        from: u16,
        to: u16,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("migration {from} -> {to} is not sequential (to must be from + 1)")]
    NonSequential { from: u16, to: u16 },

    #[error("a migration from version {from} is already registered")]
    Duplicate { from: u16 },

    #[error("min_supported_version ({min_supported}) cannot be greater than current_version ({current})")]
    InvalidRange { current: u16, min_supported: u16 },
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("save slot '{slot}' not found at {}", path.display())]
    NotFound { slot: String, path: PathBuf },

    #[error("invalid slot id '{slot}': {reason}")]
    InvalidSlot { slot: String, reason: String },

    #[error("invalid save file: {0}")]
    Format(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SaveError {
    /// The stored bytes failed authentication.
    pub fn is_tamper(&self) -> bool {
        matches!(self, SaveError::Crypto(CryptoError::Tamper))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SaveError::NotFound { .. })
    }
}

impl From<CoreError> for SaveError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Format(msg) => SaveError::Format(msg),
            CoreError::Config(msg) => SaveError::Config(msg),
            CoreError::Io(e) => SaveError::Io(e),
        }
    }
}
