//! Watermark persistence.
//!
//! The watermark is the timestamp of the newest event folded into the
//! summary by a completed run. It is stored as a bare decimal string so the
//! file can be inspected or reset by hand.

use std::cell::Cell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::TallyError;

/// Default watermark file name, relative to the working directory.
pub const DEFAULT_WATERMARK_FILE: &str = "last_processed_timestamp.txt";

/// Load/save port for the persisted watermark.
pub trait WatermarkStore {
    /// Read the persisted watermark. `Ok(None)` means nothing was persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage is unreadable or corrupt.
    fn load(&self) -> Result<Option<i64>, TallyError>;

    /// Persist `watermark`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn save(&self, watermark: i64) -> Result<(), TallyError>;
}

/// Watermark kept in a single text file.
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WatermarkStore for FileWatermarkStore {
    fn load(&self) -> Result<Option<i64>, TallyError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(TallyError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let trimmed = raw.trim();
        trimmed
            .parse::<i64>()
            .map(Some)
            .map_err(|_| TallyError::CorruptWatermark {
                path: self.path.clone(),
                raw: trimmed.to_string(),
            })
    }

    fn save(&self, watermark: i64) -> Result<(), TallyError> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, watermark.to_string()).map_err(|source| TallyError::Write {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| TallyError::Write {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), watermark, "watermark persisted");
        Ok(())
    }
}

/// In-process watermark store.
#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    value: Cell<Option<i64>>,
}

impl MemoryWatermarkStore {
    #[must_use]
    pub const fn new(initial: Option<i64>) -> Self {
        Self {
            value: Cell::new(initial),
        }
    }

    #[must_use]
    pub fn get(&self) -> Option<i64> {
        self.value.get()
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    fn load(&self) -> Result<Option<i64>, TallyError> {
        Ok(self.value.get())
    }

    fn save(&self, watermark: i64) -> Result<(), TallyError> {
        self.value.set(Some(watermark));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = FileWatermarkStore::new(dir.path().join(DEFAULT_WATERMARK_FILE));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_WATERMARK_FILE);
        let store = FileWatermarkStore::new(&path);

        store.save(1_700_000_000).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1700000000");
        assert_eq!(store.load().unwrap(), Some(1_700_000_000));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wm.txt");
        fs::write(&path, "  42\n").unwrap();
        assert_eq!(FileWatermarkStore::new(&path).load().unwrap(), Some(42));
    }

    #[test]
    fn garbage_is_reported_as_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wm.txt");
        fs::write(&path, "yesterday").unwrap();

        let err = FileWatermarkStore::new(&path).load().unwrap_err();
        match err {
            TallyError::CorruptWatermark { raw, .. } => assert_eq!(raw, "yesterday"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn memory_store_keeps_last_save() {
        let store = MemoryWatermarkStore::new(None);
        assert_eq!(store.load().unwrap(), None);
        store.save(10).unwrap();
        store.save(20).unwrap();
        assert_eq!(store.get(), Some(20));
    }
}
