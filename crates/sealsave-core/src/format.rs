//! Container header codec
//!
//! Every save file starts with a fixed 8-byte header. All numeric fields are
//! little-endian.
//!
//! ```text
//! offset 0  len 4   magic "SSAV"
//! offset 4  len 2   schema version (u16)
//! offset 6  len 2   flags (u16): bit 0 = compressed, bits 1-2 = algorithm
//! offset 8  len N   payload (algorithm-defined)
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::EncryptionAlgorithm;

/// Format identifier at offset 0.
pub const MAGIC: [u8; 4] = *b"SSAV";

/// Magic (4) + version (2) + flags (2)
pub const HEADER_SIZE: usize = 8;

/// Bit 0 of the flags field.
pub const FLAG_COMPRESSED: u16 = 0x0001;

const ALGORITHM_SHIFT: u16 = 1;
const ALGORITHM_MASK: u16 = 0b11;

/// Decoded container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Schema version the plaintext payload was serialized against
    pub version: u16,
    /// Raw flags bitfield
    pub flags: u16,
}

impl Header {
    pub fn new(version: u16, flags: u16) -> Self {
        Self { version, flags }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        encode_header(self.version, self.flags)
    }

    pub fn compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    /// Algorithm selected by the flags, or a format error for the reserved selector.
    pub fn algorithm(&self) -> CoreResult<EncryptionAlgorithm> {
        parse_flags(self.flags).map(|(_, alg)| alg)
    }
}

/// Encode magic, version and flags into the fixed 8-byte header.
pub fn encode_header(version: u16, flags: u16) -> [u8; HEADER_SIZE] {
    let mut out = [0u8; HEADER_SIZE];
    out[..4].copy_from_slice(&MAGIC);
    out[4..6].copy_from_slice(&version.to_le_bytes());
    out[6..8].copy_from_slice(&flags.to_le_bytes());
    out
}

/// Decode the header at the start of `bytes`.
///
/// The magic is checked before any other field is looked at.
pub fn decode_header(bytes: &[u8]) -> CoreResult<Header> {
    if bytes.len() < MAGIC.len() || bytes[..MAGIC.len()] != MAGIC {
        return Err(CoreError::Format(
            "magic number mismatch (not a sealsave file)".into(),
        ));
    }
    if bytes.len() < HEADER_SIZE {
        return Err(CoreError::Format(format!(
            "truncated header: {} bytes (expected {HEADER_SIZE})",
            bytes.len()
        )));
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    let flags = u16::from_le_bytes([bytes[6], bytes[7]]);
    Ok(Header { version, flags })
}

/// Build the flags field from the compression bit and algorithm selector.
pub fn build_flags(compressed: bool, algorithm: EncryptionAlgorithm) -> u16 {
    let mut flags = 0u16;
    if compressed {
        flags |= FLAG_COMPRESSED;
    }
    flags | (algorithm.selector() << ALGORITHM_SHIFT)
}

/// Split a flags field into (compressed, algorithm).
pub fn parse_flags(flags: u16) -> CoreResult<(bool, EncryptionAlgorithm)> {
    let compressed = flags & FLAG_COMPRESSED != 0;
    let selector = (flags >> ALGORITHM_SHIFT) & ALGORITHM_MASK;
    let algorithm = EncryptionAlgorithm::from_selector(selector).ok_or_else(|| {
        CoreError::Format(format!("reserved encryption selector {selector} in flags"))
    })?;
    Ok((compressed, algorithm))
}
