//! Local JSONL log store.
//!
//! Entries are appended to a JSON Lines file. A sidecar `.lock` file
//! serializes writers (shared for reads, exclusive for appends and
//! rewrites), so the lock survives the atomic rename a rewrite performs.

use super::{Capabilities, Created, LogStore};
use crate::{EntryKey, LogEntry, NewEntry, RawEntry, SyncError, SyncResult};
use async_trait::async_trait;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// JSONL-backed store with file locking
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    /// Create a store for the given log path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn blocking<T, F>(&self, f: F) -> SyncResult<T>
    where
        T: Send + 'static,
        F: FnOnce(PathBuf) -> SyncResult<T> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || f(path))
            .await
            .map_err(|e| SyncError::Storage(format!("log file task failed: {}", e)))?
    }
}

#[async_trait]
impl LogStore for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FULL
    }

    async fn fetch_all(&self) -> SyncResult<Vec<LogEntry>> {
        self.blocking(|path| read_entries(&path)).await
    }

    async fn create(&self, entry: &NewEntry) -> SyncResult<Created> {
        let stored = entry.clone().into_entry(Some(Uuid::new_v4().to_string()));
        let record = stored.clone();
        self.blocking(move |path| append_entry(&path, &record)).await?;
        Ok(Created::Record(stored))
    }

    async fn update(&self, key: &EntryKey, workout: &str) -> SyncResult<()> {
        let key = key.clone();
        let change = Change::Workout(workout.to_string());
        self.blocking(move |path| rewrite(&path, &key, change)).await
    }

    async fn delete(&self, key: &EntryKey) -> SyncResult<()> {
        let key = key.clone();
        self.blocking(move |path| rewrite(&path, &key, Change::Remove)).await
    }
}

/// Modification applied to the first record a key resolves to
enum Change {
    Workout(String),
    Remove,
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    path.with_file_name(name)
}

fn open_lock(path: &Path) -> SyncResult<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let lock = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path(path))?;
    Ok(lock)
}

/// Read all entries from the log file
pub(crate) fn read_entries(path: &Path) -> SyncResult<Vec<LogEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let lock = open_lock(path)?;
    lock.lock_shared()?;

    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match parse_line(&line) {
            Some(entry) => entries.push(entry),
            None => {
                tracing::warn!("Skipping malformed log line {}", line_num + 1);
            }
        }
    }

    lock.unlock()?;
    tracing::debug!("Read {} entries from {:?}", entries.len(), path);
    Ok(entries)
}

fn parse_line(line: &str) -> Option<LogEntry> {
    serde_json::from_str::<serde_json::Value>(line)
        .ok()
        .and_then(|record| RawEntry::from_record(&record).into_entry())
}

/// Append one entry as a JSON line
pub(crate) fn append_entry(path: &Path, entry: &LogEntry) -> SyncResult<()> {
    let lock = open_lock(path)?;
    lock.lock_exclusive()?;

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = std::io::BufWriter::new(&file);
    let line = serde_json::to_string(entry)
        .map_err(|e| SyncError::Storage(format!("failed to encode entry: {}", e)))?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    drop(writer);
    file.sync_data()?;

    lock.unlock()?;
    tracing::debug!("Appended {} entry to {:?}", entry.workout, path);
    Ok(())
}

/// Apply `change` to the first entry matching `key` and atomically replace
/// the file. Lines that do not parse are carried over untouched.
fn rewrite(path: &Path, key: &EntryKey, change: Change) -> SyncResult<()> {
    if !path.exists() {
        return Err(SyncError::NotFound(key.clone()));
    }

    let lock = open_lock(path)?;
    lock.lock_exclusive()?;

    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();
    let mut found = false;

    for line_result in reader.lines() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        let target = if found {
            None
        } else {
            parse_line(&line).filter(|entry| entry.matches(key))
        };

        match (target, &change) {
            (Some(mut entry), Change::Workout(workout)) => {
                found = true;
                entry.workout = workout.clone();
                let updated = serde_json::to_string(&entry)
                    .map_err(|e| SyncError::Storage(format!("failed to encode entry: {}", e)))?;
                lines.push(updated);
            }
            (Some(_), Change::Remove) => {
                found = true;
            }
            (None, _) => lines.push(line),
        }
    }

    if !found {
        lock.unlock()?;
        return Err(SyncError::NotFound(key.clone()));
    }

    let parent = path
        .parent()
        .ok_or_else(|| SyncError::Storage(format!("log path {:?} has no parent", path)))?;
    let temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        for line in &lines {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| SyncError::Storage(e.error.to_string()))?;

    lock.unlock()?;
    tracing::debug!("Rewrote {:?} ({} entries)", path, lines.len());
    Ok(())
}
