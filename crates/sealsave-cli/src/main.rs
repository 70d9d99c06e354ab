//! sealsave: inspect and manage encrypted save slots
//!
//! Commands:
//!   save <slot> <file|->   - encrypt a JSON value into a slot
//!   load <slot>            - decrypt a slot and print it as JSON
//!   list                   - list slots in the save directory
//!   exists <slot>          - report whether a slot exists
//!   delete <slot>          - remove a slot (backups are kept)
//!   info <slot>            - show header fields without decrypting
//!   backups <slot>         - list a slot's backups, newest first
//!   restore <slot>         - replace a slot with its newest usable backup
//!   key init | key delete  - manage the master key
//!   config show            - display the active configuration

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;

use sealsave_core::config::{KeyProviderKind, SealsaveConfig};
use sealsave_crypto::{CryptoError, KeyProvider, KeyStore, StaticKeyProvider};
use sealsave_secrets::passphrase::load_or_create_salt;
use sealsave_secrets::{platform_key_provider, KeychainKeyStore};
use sealsave_store::SaveManager;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "sealsave",
    version,
    about = "Encrypted, versioned save slots",
    long_about = "sealsave: read, write and maintain tamper-evident save files"
)]
struct Cli {
    /// Path to sealsave.toml configuration file
    #[arg(long, short = 'c', env = "SEALSAVE_CONFIG", default_value = "sealsave.toml")]
    config: PathBuf,

    /// Log filter (trace, debug, info, warn, error); overrides [logging] level
    #[arg(long, env = "SEALSAVE_LOG")]
    log: Option<String>,

    /// Log format; overrides [logging] format
    #[arg(long, env = "SEALSAVE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a JSON value into a slot
    Save {
        slot: String,
        /// JSON file to read, or `-` for stdin
        input: PathBuf,
    },

    /// Decrypt a slot and print its value as JSON
    Load {
        slot: String,
        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },

    /// List slots in the save directory
    List,

    /// Report whether a slot exists
    Exists { slot: String },

    /// Delete a slot file (backups are kept)
    Delete { slot: String },

    /// Show container header fields without decrypting
    Info { slot: String },

    /// List a slot's backups, newest first
    Backups { slot: String },

    /// Replace a slot with its newest usable backup
    Restore { slot: String },

    /// Master key management
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum KeyAction {
    /// Create the master key (keychain) or the passphrase salt file
    Init {
        /// Replace an existing keychain key. Existing saves become unreadable.
        #[arg(long)]
        force: bool,
    },
    /// Remove the master key from the platform keychain
    Delete,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SealsaveConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.logging.level.clone());
    let format = cli.log_format.unwrap_or(match config.logging.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, format);
    warn_if_config_missing(&cli.config);

    match cli.command {
        Commands::Save { slot, input } => cmd_save(&config, &slot, &input).await,
        Commands::Load { slot, pretty } => cmd_load(&config, &slot, pretty).await,
        Commands::List => cmd_list(&config).await,
        Commands::Exists { slot } => cmd_exists(&config, &slot).await,
        Commands::Delete { slot } => cmd_delete(&config, &slot).await,
        Commands::Info { slot } => cmd_info(&config, &slot).await,
        Commands::Backups { slot } => cmd_backups(&config, &slot).await,
        Commands::Restore { slot } => cmd_restore(&config, &slot).await,
        Commands::Key { action: KeyAction::Init { force } } => cmd_key_init(&config, force),
        Commands::Key { action: KeyAction::Delete } => cmd_key_delete(&config),
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
    }
}

/// The config loader runs before logging is up, so the notice is repeated here.
fn warn_if_config_missing(path: &Path) -> bool {
    let missing = !path.exists();
    if missing {
        tracing::warn!("config file not found: {}  (using defaults)", path.display());
    }
    missing
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Manager construction ──────────────────────────────────────────────────────

/// Manager whose operations need the master key.
fn keyed_manager(config: &SealsaveConfig) -> Result<SaveManager> {
    let save_dir = config.save.resolve_save_dir()?;
    let salt_path = config.keys.resolve_salt_file(&save_dir);
    let keys = platform_key_provider(&config.keys, &salt_path, read_passphrase)
        .context("selecting master key provider")?;
    SaveManager::new(config.save.clone(), Arc::from(keys)).context("creating save manager")
}

/// Manager for operations that never decrypt (listing, headers, backups).
fn keyless_manager(config: &SealsaveConfig) -> Result<SaveManager> {
    let keys: Arc<dyn KeyProvider> = Arc::new(StaticKeyProvider::empty());
    SaveManager::new(config.save.clone(), keys).context("creating save manager")
}

/// `SEALSAVE_PASSPHRASE`, or an interactive prompt.
fn read_passphrase() -> Result<SecretString, CryptoError> {
    if let Ok(passphrase) = std::env::var("SEALSAVE_PASSPHRASE") {
        return Ok(SecretString::from(passphrase));
    }
    rpassword::prompt_password("sealsave passphrase: ")
        .map(SecretString::from)
        .map_err(|e| CryptoError::KeyProvider(format!("reading passphrase: {e}")))
}

// ── Slot commands ─────────────────────────────────────────────────────────────

async fn cmd_save(config: &SealsaveConfig, slot: &str, input: &Path) -> Result<()> {
    let raw = if input == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading value from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("reading {}", input.display()))?
    };
    let value: serde_json::Value =
        serde_json::from_str(&raw).context("input is not valid JSON")?;

    let manager = keyed_manager(config)?;
    manager
        .save(slot, &value)
        .await
        .with_context(|| format!("saving slot '{slot}'"))?;
    println!("saved {slot}");
    Ok(())
}

async fn cmd_load(config: &SealsaveConfig, slot: &str, pretty: bool) -> Result<()> {
    let manager = keyed_manager(config)?;
    let value: serde_json::Value = match manager.load(slot).await {
        Ok(value) => value,
        Err(e) if e.is_tamper() => {
            anyhow::bail!(
                "slot '{slot}' failed integrity verification: the file was modified or the key is wrong\n\
                 If backups are enabled, `sealsave restore {slot}` restores the newest backup."
            )
        }
        Err(e) => return Err(e).with_context(|| format!("loading slot '{slot}'")),
    };

    let rendered = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    println!("{rendered}");
    Ok(())
}

async fn cmd_list(config: &SealsaveConfig) -> Result<()> {
    let manager = keyless_manager(config)?;
    let slots = manager.list_slots().await.context("listing slots")?;
    if slots.is_empty() {
        eprintln!("no slots in {}", manager.save_dir().display());
    }
    for slot in slots {
        println!("{slot}");
    }
    Ok(())
}

async fn cmd_exists(config: &SealsaveConfig, slot: &str) -> Result<()> {
    let exists = keyless_manager(config)?.exists(slot).await?;
    println!("{exists}");
    Ok(())
}

async fn cmd_delete(config: &SealsaveConfig, slot: &str) -> Result<()> {
    if keyless_manager(config)?.delete(slot).await? {
        println!("deleted {slot}");
    } else {
        println!("{slot}: no such slot");
    }
    Ok(())
}

async fn cmd_info(config: &SealsaveConfig, slot: &str) -> Result<()> {
    let info = keyless_manager(config)?
        .slot_info(slot)
        .await
        .with_context(|| format!("reading slot '{slot}'"))?;

    let modified = info
        .modified
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    println!("slot:        {}", info.slot);
    println!("path:        {}", info.path.display());
    println!("version:     {}", info.version);
    println!("algorithm:   {}", info.algorithm);
    println!("compressed:  {}", info.compressed);
    println!("size:        {} bytes", info.size);
    println!("modified:    {modified} (unix)");
    Ok(())
}

async fn cmd_backups(config: &SealsaveConfig, slot: &str) -> Result<()> {
    let backups = keyless_manager(config)?.backups(slot).await?;
    if backups.is_empty() {
        eprintln!("{slot}: no backups");
    }
    for path in backups {
        println!("{}", path.display());
    }
    Ok(())
}

async fn cmd_restore(config: &SealsaveConfig, slot: &str) -> Result<()> {
    match keyless_manager(config)?.restore_backup(slot).await? {
        Some(backup) => println!("restored {slot} from {}", backup.display()),
        None => anyhow::bail!("{slot}: no usable backup to restore"),
    }
    Ok(())
}

// ── `sealsave key` ────────────────────────────────────────────────────────────

fn cmd_key_init(config: &SealsaveConfig, force: bool) -> Result<()> {
    match config.keys.provider {
        KeyProviderKind::Passphrase => {
            let save_dir = config.save.resolve_save_dir()?;
            let salt_path = config.keys.resolve_salt_file(&save_dir);
            load_or_create_salt(&salt_path)?;
            println!("passphrase salt: {}", salt_path.display());
            println!("keep this file; saves cannot be decrypted without it");
        }
        KeyProviderKind::Keychain | KeyProviderKind::Auto => {
            let store = keychain(config);
            if store.has_master_key() && !force {
                anyhow::bail!(
                    "keychain already holds a master key for '{}/{}' (use --force to replace it)",
                    config.keys.keychain_service,
                    config.keys.keychain_account
                );
            }
            store
                .generate_master_key()
                .context("storing master key in platform keychain")?;
            println!(
                "master key stored in platform keychain ({}/{})",
                config.keys.keychain_service, config.keys.keychain_account
            );
        }
    }
    Ok(())
}

fn cmd_key_delete(config: &SealsaveConfig) -> Result<()> {
    keychain(config)
        .delete_master_key()
        .context("deleting master key from platform keychain")?;
    println!("master key removed from platform keychain");
    Ok(())
}

fn keychain(config: &SealsaveConfig) -> KeychainKeyStore {
    KeychainKeyStore::new(&config.keys.keychain_service, &config.keys.keychain_account)
}

// ── `sealsave config show` ────────────────────────────────────────────────────

fn cmd_config_show(config: &SealsaveConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
