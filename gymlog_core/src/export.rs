//! CSV export of the workout log.

use crate::{LogEntry, Result};
use chrono::TimeZone;
use std::path::Path;
use tempfile::NamedTempFile;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    timestamp: i64,
    /// Calendar date in the export time zone; empty if unrepresentable
    date: String,
    workout: &'a str,
    id: Option<&'a str>,
}

impl<'a> CsvRow<'a> {
    fn new<Tz: TimeZone>(entry: &'a LogEntry, tz: &Tz) -> Self {
        CsvRow {
            timestamp: entry.timestamp,
            date: entry
                .at(tz)
                .map(|at| at.date_naive().to_string())
                .unwrap_or_default(),
            workout: &entry.workout,
            id: entry.id.as_deref(),
        }
    }
}

/// Write `entries` to `path` as CSV, oldest first, replacing any existing
/// file. Returns the number of rows written.
pub fn export_csv<Tz: TimeZone>(entries: &[LogEntry], path: &Path, tz: &Tz) -> Result<usize> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut sorted: Vec<&LogEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.timestamp);

    let temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = csv::Writer::from_writer(temp.as_file());
        for entry in &sorted {
            writer.serialize(CsvRow::new(entry, tz))?;
        }
        // Header only, so an empty log still yields a valid file
        if sorted.is_empty() {
            writer.write_record(["timestamp", "date", "workout", "id"])?;
        }
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    tracing::info!("Exported {} entries to {:?}", sorted.len(), path);
    Ok(sorted.len())
}
