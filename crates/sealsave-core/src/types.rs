use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload encryption scheme recorded in bits 1-2 of the container flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncryptionAlgorithm {
    /// AES-256-CBC with PKCS#7 padding, authenticated by HMAC-SHA256
    #[default]
    AesCbcHmac,
    /// AES-256-GCM
    AesGcm,
    /// No encryption. Development builds only.
    None,
}

impl EncryptionAlgorithm {
    /// The 2-bit selector stored in the container flags.
    pub fn selector(self) -> u16 {
        match self {
            EncryptionAlgorithm::AesCbcHmac => 0,
            EncryptionAlgorithm::AesGcm => 1,
            EncryptionAlgorithm::None => 2,
        }
    }

    /// Inverse of [`selector`](Self::selector). Selector 3 is reserved.
    pub fn from_selector(selector: u16) -> Option<Self> {
        match selector {
            0 => Some(EncryptionAlgorithm::AesCbcHmac),
            1 => Some(EncryptionAlgorithm::AesGcm),
            2 => Some(EncryptionAlgorithm::None),
            _ => None,
        }
    }

    /// True for algorithms that provide no confidentiality or integrity.
    pub fn is_insecure(self) -> bool {
        matches!(self, EncryptionAlgorithm::None)
    }
}

impl fmt::Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EncryptionAlgorithm::AesCbcHmac => "aes-cbc-hmac",
            EncryptionAlgorithm::AesGcm => "aes-gcm",
            EncryptionAlgorithm::None => "none",
        };
        f.write_str(name)
    }
}

/// Encoding used to turn a save value into the plaintext payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializerKind {
    #[default]
    Json,
    Toml,
}

impl fmt::Display for SerializerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializerKind::Json => f.write_str("json"),
            SerializerKind::Toml => f.write_str("toml"),
        }
    }
}
