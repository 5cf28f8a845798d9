use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

const KEY_PREFIX: &str = "gb_used:";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to read ledger {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ledger {path} is corrupt")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write ledger {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("usage increments must be at least 1 GB")]
    ZeroAmount,

    #[error("failed to encode ledger")]
    Encode(#[from] serde_json::Error),
}

/// Durable per-day count of purchased turbo gigabytes.
///
/// The whole ledger is one JSON object rewritten atomically on every
/// increment. Only one process may own a given file.
#[derive(Debug)]
pub struct UsageLedger {
    path: PathBuf,
    entries: BTreeMap<String, u64>,
}

impl UsageLedger {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| LedgerError::Write {
                path: path.clone(),
                source,
            })?;
        }

        let entries = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|source| LedgerError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(LedgerError::Read { path, source }),
        };

        tracing::debug!(?path, days = entries.len(), "Opened usage ledger");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn used_gb(&self, date: NaiveDate) -> u64 {
        self.entries.get(&Self::key(date)).copied().unwrap_or(0)
    }

    /// Adds `gb` to the total for `date`. The in-memory total only changes
    /// once the new file is on disk.
    pub fn add_used_gb(&mut self, date: NaiveDate, gb: u64) -> Result<u64, LedgerError> {
        if gb == 0 {
            return Err(LedgerError::ZeroAmount);
        }

        let key = Self::key(date);
        let total = self.used_gb(date).saturating_add(gb);

        let mut updated = self.entries.clone();
        updated.insert(key, total);
        self.persist(&updated)?;

        self.entries = updated;
        tracing::debug!(%date, total_gb = total, "Recorded turbo usage");
        Ok(total)
    }

    /// Recorded days in ascending date order. Keys that do not parse are skipped.
    pub fn entries(&self) -> Vec<(NaiveDate, u64)> {
        self.entries
            .iter()
            .filter_map(|(key, gb)| {
                let date = key.strip_prefix(KEY_PREFIX)?.parse::<NaiveDate>().ok()?;
                Some((date, *gb))
            })
            .collect()
    }

    fn persist(&self, entries: &BTreeMap<String, u64>) -> Result<(), LedgerError> {
        let content = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.path.with_extension("json.tmp");

        let write_err = |source| LedgerError::Write {
            path: self.path.clone(),
            source,
        };

        let mut file = std::fs::File::create(&tmp_path).map_err(write_err)?;
        file.write_all(content.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        std::fs::rename(&tmp_path, &self.path).map_err(write_err)?;

        sync_parent_dir(&self.path).map_err(write_err)?;
        Ok(())
    }

    fn key(date: NaiveDate) -> String {
        format!("{KEY_PREFIX}{date}")
    }
}

/// The rename itself is only durable once the directory entry is synced.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => std::fs::File::open(parent)?.sync_all(),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
