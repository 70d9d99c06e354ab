//! Sequential schema migrations
//!
//! A migration carries a serialized payload from version `v` to `v + 1`.
//! The runner composes them to move a file from its stored version to the
//! current one. Skipping versions is not supported: every edge in
//! `[file_version, current)` must be registered.

use std::collections::BTreeMap;

use zeroize::Zeroizing;

use crate::error::MigrationError;

/// Payload transform for one version step.
pub type MigrationFn = Box<dyn Fn(&[u8]) -> anyhow::Result<Vec<u8>> + Send + Sync>;

pub struct Migration {
    from: u16,
    to: u16,
    transform: MigrationFn,
}

impl Migration {
    pub fn new<F>(from: u16, to: u16, transform: F) -> Self
    where
        F: Fn(&[u8]) -> anyhow::Result<Vec<u8>> + Send + Sync + 'static,
    {
        Self {
            from,
            to,
            transform: Box::new(transform),
        }
    }

    /// A migration from `from` to `from + 1`.
    pub fn step<F>(from: u16, transform: F) -> Self
    where
        F: Fn(&[u8]) -> anyhow::Result<Vec<u8>> + Send + Sync + 'static,
    {
        Self::new(from, from.saturating_add(1), transform)
    }

    pub fn from_version(&self) -> u16 {
        self.from
    }

    pub fn to_version(&self) -> u16 {
        self.to
    }
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct MigrationRunner {
    current: u16,
    min_supported: u16,
    steps: BTreeMap<u16, Migration>,
}

impl MigrationRunner {
    pub fn new(current: u16, min_supported: u16) -> Result<Self, MigrationError> {
        if min_supported > current {
            return Err(MigrationError::InvalidRange {
                current,
                min_supported,
            });
        }
        Ok(Self {
            current,
            min_supported,
            steps: BTreeMap::new(),
        })
    }

    pub fn current_version(&self) -> u16 {
        self.current
    }

    pub fn min_supported_version(&self) -> u16 {
        self.min_supported
    }

    pub fn register(&mut self, migration: Migration) -> Result<(), MigrationError> {
        let (from, to) = (migration.from_version(), migration.to_version());
        if from.checked_add(1) != Some(to) {
            return Err(MigrationError::NonSequential { from, to });
        }
        if self.steps.contains_key(&from) {
            return Err(MigrationError::Duplicate { from });
        }
        self.steps.insert(from, migration);
        tracing::debug!(from, to, "registered migration");
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, migration: Migration) -> Result<Self, MigrationError> {
        self.register(migration)?;
        Ok(self)
    }

    pub fn needs_migration(&self, file_version: u16) -> bool {
        file_version < self.current
    }

    /// Fail unless `file_version` lies in `[min_supported, current]`.
    pub fn check_version(&self, file_version: u16) -> Result<(), MigrationError> {
        if file_version < self.min_supported {
            return Err(MigrationError::UnsupportedVersion {
                file_version,
                min_supported: self.min_supported,
            });
        }
        if file_version > self.current {
            return Err(MigrationError::NewerVersion {
                file_version,
                current: self.current,
            });
        }
        Ok(())
    }

    /// Carry `data` from `file_version` to the current version.
    pub fn run(&self, data: &[u8], file_version: u16) -> Result<Zeroizing<Vec<u8>>, MigrationError> {
        self.check_version(file_version)?;

        let mut data = Zeroizing::new(data.to_vec());
        for from in file_version..self.current {
            let to = from + 1;
            let step = self
                .steps
                .get(&from)
                .ok_or(MigrationError::MissingMigration { from, to })?;
            data = Zeroizing::new((step.transform)(&data).map_err(|e| MigrationError::Failed {
                from,
                to,
                source: e.into(),
            })?);
            tracing::info!(from, to, "applied save migration");
        }
        Ok(data)
    }
}
