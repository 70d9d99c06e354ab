pub mod config;
pub mod error;
pub mod format;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use types::{EncryptionAlgorithm, SerializerKind};
