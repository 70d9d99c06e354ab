//! Value <-> bytes encoding for slot payloads

use sealsave_core::SerializerKind;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{SaveError, SaveResult};

/// Turns typed values into payload bytes and back.
pub trait Serializer: Send + Sync {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> SaveResult<Vec<u8>>;

    /// Fails on empty input.
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> SaveResult<T>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> SaveResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| SaveError::Serialization(format!("json encode: {e}")))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> SaveResult<T> {
        reject_empty(bytes)?;
        serde_json::from_slice(bytes)
            .map_err(|e| SaveError::Serialization(format!("json decode: {e}")))
    }
}

/// TOML payloads. Top-level values must be tables (structs or maps).
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlSerializer;

impl Serializer for TomlSerializer {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> SaveResult<Vec<u8>> {
        toml::to_string(value)
            .map(String::into_bytes)
            .map_err(|e| SaveError::Serialization(format!("toml encode: {e}")))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> SaveResult<T> {
        reject_empty(bytes)?;
        let text = std::str::from_utf8(bytes)
            .map_err(|e| SaveError::Serialization(format!("toml decode: not UTF-8: {e}")))?;
        toml::from_str(text).map_err(|e| SaveError::Serialization(format!("toml decode: {e}")))
    }
}

/// Serializer chosen at runtime from `[save] serializer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnySerializer {
    Json,
    Toml,
}

impl From<SerializerKind> for AnySerializer {
    fn from(kind: SerializerKind) -> Self {
        match kind {
            SerializerKind::Json => AnySerializer::Json,
            SerializerKind::Toml => AnySerializer::Toml,
        }
    }
}

impl Default for AnySerializer {
    fn default() -> Self {
        SerializerKind::default().into()
    }
}

impl Serializer for AnySerializer {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> SaveResult<Vec<u8>> {
        match self {
            AnySerializer::Json => JsonSerializer.serialize(value),
            AnySerializer::Toml => TomlSerializer.serialize(value),
        }
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> SaveResult<T> {
        match self {
            AnySerializer::Json => JsonSerializer.deserialize(bytes),
            AnySerializer::Toml => TomlSerializer.deserialize(bytes),
        }
    }
}

fn reject_empty(bytes: &[u8]) -> SaveResult<()> {
    if bytes.is_empty() {
        return Err(SaveError::Serialization("empty payload".into()));
    }
    Ok(())
}
