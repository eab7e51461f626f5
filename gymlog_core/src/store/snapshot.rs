//! Local copy of the last successfully loaded log.
//!
//! Written atomically after every good load so that a later failed load
//! still has something to show.

use crate::{Error, LogEntry, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub struct SnapshotCache {
    path: PathBuf,
}

impl SnapshotCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot; `None` when no snapshot has been written yet
    pub fn load(&self) -> Result<Option<Vec<LogEntry>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;
        let parsed = serde_json::from_reader::<_, Vec<LogEntry>>(BufReader::new(&file));
        file.unlock()?;

        let entries = parsed?;
        tracing::debug!("Read {} entries from snapshot {:?}", entries.len(), self.path);
        Ok(Some(entries))
    }

    /// Replace the snapshot atomically
    pub fn save(&self, entries: &[LogEntry]) -> Result<()> {
        let parent = self.path.parent().ok_or_else(|| {
            Error::Other(format!("snapshot path {:?} has no parent", self.path))
        })?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer(&mut writer, entries)?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} entries to snapshot {:?}", entries.len(), self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_snapshot_is_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(temp_dir.path().join("snapshot.json"));
        assert_eq!(cache.load().unwrap(), None);
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(temp_dir.path().join("cache").join("snapshot.json"));
        let entries = vec![
            LogEntry::new(Some("1".into()), 10, "Legs"),
            LogEntry::new(None, 20, "Rest Day"),
        ];

        cache.save(&entries).unwrap();
        assert_eq!(cache.load().unwrap(), Some(entries));
    }

    #[test]
    fn test_corrupted_snapshot_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("snapshot.json");
        std::fs::write(&path, "[{").unwrap();

        assert!(SnapshotCache::new(&path).load().is_err());
    }
}
