use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Structurally invalid input (too short, wrong layout). Not necessarily malicious.
    #[error("malformed ciphertext: {0}")]
    Format(String),

    /// Authentication failed: the bytes were altered after encryption or the key is wrong.
    #[error("data integrity verification failed")]
    Tamper,

    /// Cipher failure after successful authentication, or on the encrypt side.
    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("key provider error: {0}")]
    KeyProvider(String),

    #[error("unsupported: {0}")]
    Unsupported(String),
}
