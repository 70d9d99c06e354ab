//! Slot-level save/load orchestration
//!
//! Every `save`/`load` on a slot takes that slot's lock first and releases it
//! last, so one slot's file is never written and read at the same time while
//! distinct slots proceed in parallel. Key material is fetched per operation
//! and wiped when it goes out of scope.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use std::time::SystemTime;

use sealsave_core::config::SaveSettings;
use sealsave_core::EncryptionAlgorithm;
use sealsave_crypto::{derive_keys, provider_for, DerivedKeys, EncryptionProvider, KeyProvider};
use serde::de::DeserializeOwned;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::backup::BackupRotator;
use crate::error::{SaveError, SaveResult};
use crate::migration::MigrationRunner;
use crate::save_file;
use crate::serializer::{AnySerializer, Serializer};
use crate::slot::{slot_id_from_file_name, SaveSlot};

type SlotLock = Arc<tokio::sync::Mutex<()>>;

/// Header-level facts about a slot, read without decrypting.
#[derive(Debug, Clone, Serialize)]
pub struct SlotInfo {
    pub slot: String,
    pub path: PathBuf,
    pub version: u16,
    pub algorithm: EncryptionAlgorithm,
    pub compressed: bool,
    pub size: u64,
    pub modified: SystemTime,
}

pub struct SaveManager<S = AnySerializer> {
    settings: SaveSettings,
    dir: PathBuf,
    keys: Arc<dyn KeyProvider>,
    provider: Box<dyn EncryptionProvider>,
    serializer: S,
    migrations: MigrationRunner,
    backups: BackupRotator,
    locks: std::sync::Mutex<HashMap<String, SlotLock>>,
}

impl SaveManager<AnySerializer> {
    /// Manager using the serializer named in `settings`.
    pub fn new(settings: SaveSettings, keys: Arc<dyn KeyProvider>) -> SaveResult<Self> {
        let serializer = AnySerializer::from(settings.serializer);
        Self::with_serializer(settings, keys, serializer)
    }
}

impl<S: Serializer> SaveManager<S> {
    pub fn with_serializer(
        settings: SaveSettings,
        keys: Arc<dyn KeyProvider>,
        serializer: S,
    ) -> SaveResult<Self> {
        settings.validate()?;
        let dir = settings.resolve_save_dir()?;
        let provider = provider_for(settings.algorithm, settings.allow_insecure)?;
        let migrations =
            MigrationRunner::new(settings.current_version, settings.min_supported_version)?;
        let backups = BackupRotator::new(settings.max_backups.max(1))?;

        tracing::debug!(
            dir = %dir.display(),
            algorithm = %settings.algorithm,
            version = settings.current_version,
            "save manager ready"
        );
        Ok(Self {
            settings,
            dir,
            keys,
            provider,
            serializer,
            migrations,
            backups,
            locks: std::sync::Mutex::new(HashMap::new()),
        })
    }

    /// Replace the migration registry. Its version range must match the settings.
    pub fn with_migrations(mut self, runner: MigrationRunner) -> SaveResult<Self> {
        if runner.current_version() != self.settings.current_version
            || runner.min_supported_version() != self.settings.min_supported_version
        {
            return Err(SaveError::Config(format!(
                "migration runner covers {}..={}, settings require {}..={}",
                runner.min_supported_version(),
                runner.current_version(),
                self.settings.min_supported_version,
                self.settings.current_version
            )));
        }
        self.migrations = runner;
        Ok(self)
    }

    pub fn migrations_mut(&mut self) -> &mut MigrationRunner {
        &mut self.migrations
    }

    pub fn settings(&self) -> &SaveSettings {
        &self.settings
    }

    pub fn save_dir(&self) -> &Path {
        &self.dir
    }

    /// Serialize, encrypt and atomically write `value` to `slot_id`.
    pub async fn save<T>(&self, slot_id: &str, value: &T) -> SaveResult<()>
    where
        T: Serialize + ?Sized + Sync,
    {
        let slot = self.slot(slot_id)?;
        let lock = self.slot_lock(slot.id());
        let _guard = lock.lock().await;

        let serialized = Zeroizing::new(self.serializer.serialize(value)?);
        let keys = self.derived_keys()?;
        save_file::write(
            slot.path(),
            &serialized,
            &keys.encryption,
            &keys.mac,
            self.settings.current_version,
            &*self.provider,
            self.settings.compress,
        )
        .await?;

        if self.settings.auto_backup {
            self.backups.rotate(slot.path()).await?;
        }

        tracing::info!(
            slot = slot.id(),
            version = self.settings.current_version,
            "saved"
        );
        Ok(())
    }

    /// Read, verify, decrypt, migrate and deserialize `slot_id`.
    pub async fn load<T: DeserializeOwned>(&self, slot_id: &str) -> SaveResult<T> {
        let slot = self.slot(slot_id)?;
        let lock = self.slot_lock(slot.id());
        let _guard = lock.lock().await;

        // The container records its algorithm; it may differ from the configured one.
        let header = save_file::read_header(slot.path())
            .await
            .map_err(|e| if e.is_not_found() { slot.not_found() } else { e })?;
        let provider = provider_for(header.algorithm()?, self.settings.allow_insecure)?;

        let (plaintext, version) = {
            let keys = self.derived_keys()?;
            save_file::read(slot.path(), &keys.encryption, &keys.mac, &*provider).await
        }
        .map_err(|e| if e.is_not_found() { slot.not_found() } else { e })
        .inspect_err(|e| {
            if e.is_tamper() {
                tracing::warn!(
                    slot = slot.id(),
                    path = %slot.path().display(),
                    "save data failed authentication: file was modified or key is wrong"
                );
            }
        })?;

        self.migrations.check_version(version)?;
        let value = if self.migrations.needs_migration(version) {
            let migrated = self.migrations.run(&plaintext, version)?;
            tracing::info!(
                slot = slot.id(),
                from = version,
                to = self.migrations.current_version(),
                "migrated save"
            );
            self.serializer.deserialize(&migrated)?
        } else {
            self.serializer.deserialize(&plaintext)?
        };

        tracing::info!(slot = slot.id(), version, "loaded");
        Ok(value)
    }

    pub async fn exists(&self, slot_id: &str) -> SaveResult<bool> {
        Ok(self.slot(slot_id)?.exists().await)
    }

    /// Remove the slot file. Backups are kept. Returns whether a file was removed.
    pub async fn delete(&self, slot_id: &str) -> SaveResult<bool> {
        let slot = self.slot(slot_id)?;
        let lock = self.slot_lock(slot.id());
        let _guard = lock.lock().await;

        match tokio::fs::remove_file(slot.path()).await {
            Ok(()) => {
                tracing::info!(slot = slot.id(), "deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Ids of all committed slots in the save directory, sorted.
    pub async fn list_slots(&self) -> SaveResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut slots = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(slot_id_from_file_name) {
                slots.push(id.to_string());
            }
        }
        slots.sort();
        Ok(slots)
    }

    pub async fn slot_info(&self, slot_id: &str) -> SaveResult<SlotInfo> {
        let slot = self.slot(slot_id)?;
        let header = save_file::read_header(slot.path())
            .await
            .map_err(|e| if e.is_not_found() { slot.not_found() } else { e })?;
        let size = tokio::fs::metadata(slot.path()).await?.len();
        let modified = slot.last_modified().await?;

        Ok(SlotInfo {
            slot: slot.id().to_string(),
            path: slot.path().to_path_buf(),
            version: header.version,
            algorithm: header.algorithm()?,
            compressed: header.compressed(),
            size,
            modified,
        })
    }

    /// Existing backups of `slot_id`, newest first.
    pub async fn backups(&self, slot_id: &str) -> SaveResult<Vec<PathBuf>> {
        let slot = self.slot(slot_id)?;
        self.backups.backup_paths(slot.path()).await
    }

    /// Replace the slot file with its newest backup that has a valid header.
    ///
    /// Returns the backup used, or `None` if no usable backup exists.
    pub async fn restore_backup(&self, slot_id: &str) -> SaveResult<Option<PathBuf>> {
        let slot = self.slot(slot_id)?;
        let lock = self.slot_lock(slot.id());
        let _guard = lock.lock().await;

        self.backups.restore_latest(slot.path()).await
    }

    fn slot(&self, slot_id: &str) -> SaveResult<SaveSlot> {
        SaveSlot::new(&self.dir, slot_id)
    }

    /// The one lock for `slot_id`, created on first use.
    ///
    /// Entries nobody holds or waits on are dropped here, so the map stays
    /// bounded by the number of slots with operations in flight.
    fn slot_lock(&self, slot_id: &str) -> SlotLock {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|id, lock| id == slot_id || Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(slot_id.to_string()).or_default())
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Derive this operation's sub-keys. The master key copy is wiped on return.
    fn derived_keys(&self) -> SaveResult<DerivedKeys> {
        let master = self.keys.master_key()?;
        Ok(derive_keys(master.as_bytes())?)
    }
}

impl<S> std::fmt::Debug for SaveManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveManager")
            .field("dir", &self.dir)
            .field("algorithm", &self.settings.algorithm)
            .field("current_version", &self.settings.current_version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealsave_crypto::{CryptoError, MasterKey, StaticKeyProvider};
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Progress {
        chapter: u32,
        flags: BTreeMap<String, bool>,
    }

    fn progress(chapter: u32) -> Progress {
        Progress {
            chapter,
            flags: BTreeMap::from([("met_the_king".to_string(), true)]),
        }
    }

    fn settings(dir: &Path) -> SaveSettings {
        SaveSettings {
            save_dir: Some(dir.to_path_buf()),
            ..SaveSettings::default()
        }
    }

    fn keys(byte: u8) -> Arc<dyn KeyProvider> {
        Arc::new(StaticKeyProvider::new(MasterKey::from_bytes([byte; 32])))
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SaveManager::new(settings(dir.path()), keys(1)).unwrap();

        manager.save("slot1", &progress(3)).await.unwrap();
        assert!(manager.exists("slot1").await.unwrap());
        let loaded: Progress = manager.load("slot1").await.unwrap();
        assert_eq!(loaded, progress(3));
    }

    #[tokio::test]
    async fn test_load_missing_slot() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SaveManager::new(settings(dir.path()), keys(1)).unwrap();
        let err = manager.load::<Progress>("nothing").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("nothing"));
    }

    #[tokio::test]
    async fn test_invalid_slot_id() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SaveManager::new(settings(dir.path()), keys(1)).unwrap();
        assert!(matches!(
            manager.save("../outside", &progress(1)).await,
            Err(SaveError::InvalidSlot { .. })
        ));
    }

    #[tokio::test]
    async fn test_wrong_master_key_is_tamper() {
        let dir = tempfile::tempdir().unwrap();
        SaveManager::new(settings(dir.path()), keys(1))
            .unwrap()
            .save("main", &progress(1))
            .await
            .unwrap();

        let other = SaveManager::new(settings(dir.path()), keys(2)).unwrap();
        let err = other.load::<Progress>("main").await.unwrap_err();
        assert!(matches!(err, SaveError::Crypto(CryptoError::Tamper)));
    }

    #[tokio::test]
    async fn test_load_follows_container_algorithm() {
        let dir = tempfile::tempdir().unwrap();
        let gcm = SaveSettings {
            algorithm: EncryptionAlgorithm::AesGcm,
            compress: true,
            ..settings(dir.path())
        };
        SaveManager::new(gcm, keys(1))
            .unwrap()
            .save("main", &progress(7))
            .await
            .unwrap();

        // configured for CBC+HMAC, file says GCM
        let manager = SaveManager::new(settings(dir.path()), keys(1)).unwrap();
        let loaded: Progress = manager.load("main").await.unwrap();
        assert_eq!(loaded, progress(7));

        let info = manager.slot_info("main").await.unwrap();
        assert_eq!(info.algorithm, EncryptionAlgorithm::AesGcm);
        assert!(info.compressed);
        assert_eq!(info.version, 1);
    }

    #[tokio::test]
    async fn test_newer_file_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let v2 = SaveSettings {
            current_version: 2,
            ..settings(dir.path())
        };
        SaveManager::new(v2, keys(1))
            .unwrap()
            .save("main", &progress(1))
            .await
            .unwrap();

        let v1 = SaveManager::new(settings(dir.path()), keys(1)).unwrap();
        assert!(matches!(
            v1.load::<Progress>("main").await,
            Err(SaveError::Migration(
                crate::error::MigrationError::NewerVersion {
                    file_version: 2,
                    current: 1
                }
            ))
        ));
    }

    #[tokio::test]
    async fn test_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SaveManager::new(settings(dir.path()), keys(1)).unwrap();
        assert!(manager.list_slots().await.unwrap().is_empty());

        manager.save("b", &progress(1)).await.unwrap();
        manager.save("a", &progress(2)).await.unwrap();
        std::fs::write(dir.path().join("c.sav.tmp"), b"partial").unwrap();
        std::fs::write(dir.path().join("a.sav.bak.1"), b"old").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        assert_eq!(manager.list_slots().await.unwrap(), vec!["a", "b"]);
        assert!(manager.delete("a").await.unwrap());
        assert!(!manager.delete("a").await.unwrap());
        assert_eq!(manager.list_slots().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_auto_backup_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let backed_up = SaveSettings {
            auto_backup: true,
            max_backups: 2,
            ..settings(dir.path())
        };
        let manager = SaveManager::new(backed_up, keys(1)).unwrap();

        manager.save("main", &progress(1)).await.unwrap();
        manager.save("main", &progress(2)).await.unwrap();
        manager.save("main", &progress(3)).await.unwrap();
        assert_eq!(manager.backups("main").await.unwrap().len(), 2);

        std::fs::write(dir.path().join("main.sav"), b"garbage").unwrap();
        assert!(manager.load::<Progress>("main").await.is_err());

        let used = manager.restore_backup("main").await.unwrap();
        assert!(used.is_some());
        let loaded: Progress = manager.load("main").await.unwrap();
        assert_eq!(loaded, progress(3));
    }

    #[tokio::test]
    async fn test_restore_skips_unusable_backup() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SaveManager::new(settings(dir.path()), keys(1)).unwrap();
        manager.save("main", &progress(5)).await.unwrap();

        std::fs::copy(dir.path().join("main.sav"), dir.path().join("main.sav.bak.2")).unwrap();
        std::fs::write(dir.path().join("main.sav.bak.1"), b"not a save").unwrap();
        std::fs::remove_file(dir.path().join("main.sav")).unwrap();

        let used = manager.restore_backup("main").await.unwrap();
        assert_eq!(used, Some(dir.path().join("main.sav.bak.2")));
        assert_eq!(manager.load::<Progress>("main").await.unwrap(), progress(5));
    }

    #[test]
    fn test_migration_range_must_match_settings() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SaveManager::new(settings(dir.path()), keys(1)).unwrap();
        let runner = MigrationRunner::new(3, 1).unwrap();
        assert!(matches!(
            manager.with_migrations(runner),
            Err(SaveError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bad = SaveSettings {
            min_supported_version: 4,
            current_version: 2,
            ..settings(dir.path())
        };
        assert!(matches!(
            SaveManager::new(bad, keys(1)),
            Err(SaveError::Config(_))
        ));
    }

    #[test]
    fn test_one_lock_per_slot() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SaveManager::new(settings(dir.path()), keys(1)).unwrap();
        let a = manager.slot_lock("main");
        let b = manager.slot_lock("main");
        let c = manager.slot_lock("other");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn test_idle_locks_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SaveManager::new(settings(dir.path()), keys(1)).unwrap();
        for slot in ["a", "b", "c", "d"] {
            manager.save(slot, &progress(1)).await.unwrap();
        }
        manager.delete("a").await.unwrap();
        assert_eq!(manager.tracked_locks(), 1);

        let held = manager.slot_lock("b");
        let _other = manager.slot_lock("c");
        assert_eq!(manager.tracked_locks(), 2);
        assert!(Arc::ptr_eq(&held, &manager.slot_lock("b")));
    }

    #[tokio::test]
    async fn test_load_runs_registered_migration() {
        let dir = tempfile::tempdir().unwrap();
        SaveManager::new(settings(dir.path()), keys(1))
            .unwrap()
            .save("main", &progress(4))
            .await
            .unwrap();

        let v2 = SaveSettings {
            current_version: 2,
            ..settings(dir.path())
        };
        let runner = MigrationRunner::new(2, 1)
            .unwrap()
            .with(crate::migration::Migration::step(1, |data| {
                let mut value: serde_json::Value = serde_json::from_slice(data)?;
                value["chapter"] = serde_json::json!(value["chapter"].as_u64().unwrap_or(0) + 10);
                Ok(serde_json::to_vec(&value)?)
            }))
            .unwrap();
        let manager = SaveManager::new(v2, keys(1))
            .unwrap()
            .with_migrations(runner)
            .unwrap();

        let loaded: Progress = manager.load("main").await.unwrap();
        assert_eq!(loaded, progress(14));
    }

    #[tokio::test]
    async fn test_slot_info_reports_header() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SaveManager::new(settings(dir.path()), keys(1)).unwrap();
        assert!(manager.slot_info("main").await.unwrap_err().is_not_found());

        manager.save("main", &progress(2)).await.unwrap();
        let info = manager.slot_info("main").await.unwrap();
        assert_eq!(info.slot, "main");
        assert_eq!(info.algorithm, EncryptionAlgorithm::AesCbcHmac);
        assert!(!info.compressed);
        assert_eq!(info.size, std::fs::metadata(&info.path).unwrap().len());
        assert!(info.modified <= SystemTime::now());
    }
}
