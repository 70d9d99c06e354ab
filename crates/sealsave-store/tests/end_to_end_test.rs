//! Save/load through the public `SaveManager` API against a real directory.

use std::path::Path;
use std::sync::Arc;

use sealsave_core::config::SaveSettings;
use sealsave_core::format::HEADER_SIZE;
use sealsave_crypto::{KeyProvider, MasterKey, StaticKeyProvider};
use sealsave_store::{Migration, MigrationError, MigrationRunner, SaveError, SaveManager};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Hero {
    name: String,
    level: u32,
}

fn hero() -> Hero {
    Hero {
        name: "Hero".into(),
        level: 10,
    }
}

fn settings(dir: &Path, current_version: u16) -> SaveSettings {
    SaveSettings {
        save_dir: Some(dir.to_path_buf()),
        current_version,
        ..SaveSettings::default()
    }
}

fn key_provider() -> Arc<dyn KeyProvider> {
    Arc::new(StaticKeyProvider::new(MasterKey::from_bytes([42u8; 32])))
}

#[tokio::test]
async fn hero_roundtrip_then_tamper() {
    let dir = tempfile::tempdir().unwrap();
    let manager = SaveManager::new(settings(dir.path(), 1), key_provider()).unwrap();

    manager.save("main", &hero()).await.unwrap();
    let loaded: Hero = manager.load("main").await.unwrap();
    assert_eq!(loaded, hero());

    // flip one ciphertext byte
    let path = dir.path().join("main.sav");
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[HEADER_SIZE + 17] ^= 0x01;
    std::fs::write(&path, &bytes).unwrap();

    let err = manager.load::<Hero>("main").await.unwrap_err();
    assert!(err.is_tamper(), "expected tamper error, got {err}");
}

#[tokio::test]
async fn no_temp_file_left_after_save() {
    let dir = tempfile::tempdir().unwrap();
    let manager = SaveManager::new(settings(dir.path(), 1), key_provider()).unwrap();

    manager.save("main", &hero()).await.unwrap();
    manager.save("main", &hero()).await.unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["main.sav"]);
}

fn prefix(p: &'static str) -> Migration {
    let from = if p == "A:" { 1 } else { 2 };
    Migration::step(from, move |data| {
        let mut out = p.as_bytes().to_vec();
        out.extend_from_slice(data);
        Ok(out)
    })
}

/// Serializes a bare string so migrations can prepend raw bytes to it.
#[derive(Debug, Clone, Copy, Default)]
struct RawText;

impl sealsave_store::Serializer for RawText {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> sealsave_store::SaveResult<Vec<u8>> {
        let json = serde_json::to_value(value).map_err(|e| SaveError::Serialization(e.to_string()))?;
        json.as_str()
            .map(|s| s.as_bytes().to_vec())
            .ok_or_else(|| SaveError::Serialization("expected a string".into()))
    }

    fn deserialize<T: serde::de::DeserializeOwned>(
        &self,
        bytes: &[u8],
    ) -> sealsave_store::SaveResult<T> {
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|e| SaveError::Serialization(e.to_string()))?;
        serde_json::from_value(serde_json::Value::String(text))
            .map_err(|e| SaveError::Serialization(e.to_string()))
    }
}

#[tokio::test]
async fn migrations_compose_on_load() {
    let dir = tempfile::tempdir().unwrap();

    SaveManager::with_serializer(settings(dir.path(), 1), key_provider(), RawText)
        .unwrap()
        .save("main", "x")
        .await
        .unwrap();

    let runner = MigrationRunner::new(3, 1)
        .unwrap()
        .with(prefix("A:"))
        .unwrap()
        .with(prefix("B:"))
        .unwrap();
    let manager = SaveManager::with_serializer(settings(dir.path(), 3), key_provider(), RawText)
        .unwrap()
        .with_migrations(runner)
        .unwrap();

    let loaded: String = manager.load("main").await.unwrap();
    assert_eq!(loaded, "B:A:x");

    // saving again writes the current version; loading needs no migration
    manager.save("main", &loaded).await.unwrap();
    assert_eq!(manager.slot_info("main").await.unwrap().version, 3);
    assert_eq!(manager.load::<String>("main").await.unwrap(), "B:A:x");
}

#[tokio::test]
async fn migration_gap_is_reported() {
    let dir = tempfile::tempdir().unwrap();

    SaveManager::with_serializer(settings(dir.path(), 1), key_provider(), RawText)
        .unwrap()
        .save("main", "x")
        .await
        .unwrap();

    let mut manager =
        SaveManager::with_serializer(settings(dir.path(), 3), key_provider(), RawText).unwrap();
    manager.migrations_mut().register(prefix("A:")).unwrap();

    match manager.load::<String>("main").await {
        Err(SaveError::Migration(MigrationError::MissingMigration { from, to })) => {
            assert_eq!((from, to), (2, 3));
        }
        other => panic!("expected missing migration 2 -> 3, got {other:?}"),
    }
}

#[tokio::test]
async fn old_version_below_minimum_is_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    SaveManager::new(settings(dir.path(), 1), key_provider())
        .unwrap()
        .save("main", &hero())
        .await
        .unwrap();

    let strict = SaveSettings {
        min_supported_version: 2,
        ..settings(dir.path(), 2)
    };
    let manager = SaveManager::new(strict, key_provider()).unwrap();
    assert!(matches!(
        manager.load::<Hero>("main").await,
        Err(SaveError::Migration(MigrationError::UnsupportedVersion { .. }))
    ));
}
