//! sealsave-store: encrypted, versioned save slots
//!
//! Save pipeline:
//! ```text
//! value ─ Serializer ─▶ bytes ─(zstd)─▶ EncryptionProvider ─▶ header ‖ blob ─▶ <slot>.sav.tmp ─ rename ─▶ <slot>.sav
//! ```
//! Load runs the same steps in reverse, verifying before decrypting and
//! migrating the plaintext to the current schema before deserializing.

pub mod backup;
pub mod error;
pub mod manager;
pub mod migration;
pub mod save_file;
pub mod serializer;
pub mod slot;

pub use backup::BackupRotator;
pub use error::{MigrationError, SaveError, SaveResult};
pub use manager::{SaveManager, SlotInfo};
pub use migration::{Migration, MigrationRunner};
pub use save_file::Container;
pub use serializer::{AnySerializer, JsonSerializer, Serializer, TomlSerializer};
pub use slot::SaveSlot;

/// File extension of committed slot files
pub const SAVE_EXTENSION: &str = "sav";
