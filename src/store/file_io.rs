//! Synchronous disk tier: one file per cache key.
//!
//! Entries live flat under the cache directory as `{key}.cache`. Writes go
//! through a temporary file and an atomic rename, so a crash mid-write
//! leaves either the old entry or the new one, never a truncated file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;
use tracing::debug;

/// Extension given to every entry file.
const CACHE_EXT: &str = "cache";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid cache format version: {0}")]
    InvalidVersion(#[from] crate::store::version::KeyFormatError),
}

/// File-tier statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTierStats {
    pub entry_count: usize,
    pub total_bytes: u64,
}

/// The durable file tier.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open the tier rooted at `dir`, creating the directory if needed.
    pub fn open(dir: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory this tier stores entries under.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the entry file for a key.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{CACHE_EXT}"))
    }

    /// Write an entry, replacing any previous one for the same key.
    pub fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.{CACHE_EXT}.tmp"));

        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;

        debug!(key, size = bytes.len(), "wrote cache entry");
        Ok(())
    }

    /// Read an entry's bytes; `None` when no file exists for the key.
    pub fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(key, size = bytes.len(), "read cache entry");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Age of an entry file in hours, by modification time.
    ///
    /// `None` when the file is missing or the platform reports no mtime.
    pub fn age_hours(&self, key: &str) -> Option<f64> {
        let modified = fs::metadata(self.path_for(key)).ok()?.modified().ok()?;
        let elapsed = SystemTime::now().duration_since(modified).ok()?;
        Some(elapsed.as_secs_f64() / 3600.0)
    }

    /// Delete one entry file if present. Returns whether a file was removed.
    pub fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(key, "deleted cache entry");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Keys of every entry currently on disk.
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(CACHE_EXT) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        Ok(keys)
    }

    /// Entry count and total size of the tier.
    pub fn stats(&self) -> Result<FileTierStats, StoreError> {
        let mut stats = FileTierStats::default();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(CACHE_EXT) {
                stats.entry_count += 1;
                stats.total_bytes += entry.metadata()?.len();
            }
        }
        Ok(stats)
    }
}
