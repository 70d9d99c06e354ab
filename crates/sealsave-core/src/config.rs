use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};
use crate::types::{EncryptionAlgorithm, SerializerKind};

/// Top-level configuration (loaded from sealsave.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SealsaveConfig {
    pub save: SaveSettings,
    pub keys: KeyConfig,
    pub logging: LoggingConfig,
}

impl SealsaveConfig {
    /// Load from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| CoreError::Config(format!("parsing {}: {e}", path.display())))?;
        config.save.validate()?;
        Ok(config)
    }
}

/// Per-session save pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveSettings {
    /// Payload encryption algorithm for new saves
    pub algorithm: EncryptionAlgorithm,
    /// Payload encoding
    pub serializer: SerializerKind,
    /// zstd-compress payloads before encryption
    pub compress: bool,
    /// Directory holding `<slot>.sav` files (unset or empty: platform data dir)
    pub save_dir: Option<PathBuf>,
    /// Copy each committed save into a rotating `.bak.N` set
    pub auto_backup: bool,
    /// Number of backups kept per slot
    pub max_backups: u32,
    /// Schema version written by this build
    pub current_version: u16,
    /// Oldest schema version this build will migrate from
    pub min_supported_version: u16,
    /// Permit the `none` algorithm. Never enable outside development.
    pub allow_insecure: bool,
}

impl Default for SaveSettings {
    fn default() -> Self {
        Self {
            algorithm: EncryptionAlgorithm::AesCbcHmac,
            serializer: SerializerKind::Json,
            compress: false,
            save_dir: None,
            auto_backup: false,
            max_backups: 3,
            current_version: 1,
            min_supported_version: 1,
            allow_insecure: false,
        }
    }
}

impl SaveSettings {
    pub fn validate(&self) -> CoreResult<()> {
        if self.current_version == 0 {
            return Err(CoreError::Config("current_version must be at least 1".into()));
        }
        if self.min_supported_version > self.current_version {
            return Err(CoreError::Config(format!(
                "min_supported_version ({}) cannot be greater than current_version ({})",
                self.min_supported_version, self.current_version
            )));
        }
        if self.auto_backup && self.max_backups == 0 {
            return Err(CoreError::Config(
                "max_backups must be positive when auto_backup is enabled".into(),
            ));
        }
        if self.algorithm.is_insecure() && !self.allow_insecure {
            return Err(CoreError::Config(
                "algorithm 'none' requires allow_insecure = true".into(),
            ));
        }
        Ok(())
    }

    /// The effective save directory.
    pub fn resolve_save_dir(&self) -> CoreResult<PathBuf> {
        match &self.save_dir {
            Some(dir) if !dir.as_os_str().is_empty() => Ok(expand_tilde(dir)),
            _ => default_save_dir(),
        }
    }
}

/// Which key provider backs the master key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyProviderKind {
    /// Platform keychain when it holds a key, passphrase otherwise
    #[default]
    Auto,
    Keychain,
    Passphrase,
}

/// Master key source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    pub provider: KeyProviderKind,
    /// Keychain service name
    pub keychain_service: String,
    /// Keychain account (entry) name
    pub keychain_account: String,
    /// Salt file for the passphrase provider (default: `<save_dir>/master.salt`)
    pub salt_file: Option<PathBuf>,
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            provider: KeyProviderKind::Auto,
            keychain_service: "sealsave".into(),
            keychain_account: "master-key".into(),
            salt_file: None,
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
        }
    }
}

impl KeyConfig {
    pub fn resolve_salt_file(&self, save_dir: &Path) -> PathBuf {
        match &self.salt_file {
            Some(path) => expand_tilde(path),
            None => save_dir.join("master.salt"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

fn default_save_dir() -> CoreResult<PathBuf> {
    directories::ProjectDirs::from("dev", "sealsave", "sealsave")
        .map(|dirs| dirs.data_dir().join("saves"))
        .ok_or_else(|| CoreError::Config("cannot determine platform data directory".into()))
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~/")) {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    path.to_path_buf()
}
