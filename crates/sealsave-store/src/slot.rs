//! Slot ids and their file paths

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{SaveError, SaveResult};
use crate::SAVE_EXTENSION;

/// A validated slot id bound to `<dir>/<id>.sav`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSlot {
    id: String,
    path: PathBuf,
}

impl SaveSlot {
    pub fn new(dir: &Path, id: &str) -> SaveResult<Self> {
        validate_id(id)?;
        Ok(Self {
            id: id.to_string(),
            path: dir.join(format!("{id}.{SAVE_EXTENSION}")),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    pub async fn last_modified(&self) -> SaveResult<SystemTime> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.modified()?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(self.not_found()),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn not_found(&self) -> SaveError {
        SaveError::NotFound {
            slot: self.id.clone(),
            path: self.path.clone(),
        }
    }
}

/// If `file_name` is a committed slot file, return its slot id.
///
/// Temp files (`x.sav.tmp`) and backups (`x.sav.bak.N`) are not slots.
pub fn slot_id_from_file_name(file_name: &str) -> Option<&str> {
    let id = file_name.strip_suffix(SAVE_EXTENSION)?.strip_suffix('.')?;
    validate_id(id).ok().map(|()| id)
}

fn validate_id(id: &str) -> SaveResult<()> {
    let invalid = |reason: &str| SaveError::InvalidSlot {
        slot: id.to_string(),
        reason: reason.to_string(),
    };
    if id.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if id.contains(['/', '\\']) {
        return Err(invalid("must not contain path separators"));
    }
    if id.contains("..") {
        return Err(invalid("must not contain '..'"));
    }
    if id.starts_with('.') {
        return Err(invalid("must not start with '.'"));
    }
    if id.chars().any(char::is_control) {
        return Err(invalid("must not contain control characters"));
    }
    Ok(())
}
