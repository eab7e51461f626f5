//! Core domain types for Gymlog.
//!
//! This module defines the fundamental types used throughout the system:
//! - Log entries and the identity used to address them
//! - The payload submitted when a new entry is created
//! - The loose wire shape records arrive in before ingestion

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved workout label marking a rest day (compared case-insensitively)
pub const REST_DAY: &str = "Rest Day";

/// Check whether a workout label is the rest-day marker
pub fn is_rest_day(workout: &str) -> bool {
    workout.eq_ignore_ascii_case(REST_DAY)
}

// ============================================================================
// Log Entries
// ============================================================================

/// One recorded workout (or rest day)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    /// Identifier issued by the backing store, if it issues any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Milliseconds since the Unix epoch, set by the client at creation
    pub timestamp: i64,
    pub workout: String,
}

impl LogEntry {
    pub fn new(id: Option<String>, timestamp: i64, workout: impl Into<String>) -> Self {
        Self {
            id,
            timestamp,
            workout: workout.into(),
        }
    }

    /// The identity callers use to address this entry.
    ///
    /// Store-issued ids win; entries from timestamp-keyed stores fall back
    /// to their timestamp.
    pub fn key(&self) -> EntryKey {
        match &self.id {
            Some(id) => EntryKey::Id(id.clone()),
            None => EntryKey::Timestamp(self.timestamp),
        }
    }

    /// Whether `key` addresses this entry
    pub fn matches(&self, key: &EntryKey) -> bool {
        match key {
            EntryKey::Id(id) => self.id.as_deref() == Some(id.as_str()),
            EntryKey::Timestamp(ts) => self.timestamp == *ts,
        }
    }

    pub fn is_rest_day(&self) -> bool {
        is_rest_day(&self.workout)
    }

    /// The entry's instant in the given time zone
    ///
    /// Returns `None` for timestamps chrono cannot represent.
    pub fn at<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        tz.timestamp_millis_opt(self.timestamp).single()
    }
}

/// Abstract identity of a log entry, adapted by each backend
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntryKey {
    /// Identifier issued by the store
    Id(String),
    /// Creation timestamp (ms), for stores that key rows by time
    Timestamp(i64),
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKey::Id(id) => write!(f, "id {}", id),
            EntryKey::Timestamp(ts) => write!(f, "timestamp {}", ts),
        }
    }
}

/// Payload for creating a new log entry
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewEntry {
    pub timestamp: i64,
    pub workout: String,
}

impl NewEntry {
    /// Stamp a new entry at the given instant
    pub fn at(workout: impl Into<String>, when: DateTime<Utc>) -> Self {
        Self {
            timestamp: when.timestamp_millis(),
            workout: workout.into(),
        }
    }

    pub fn into_entry(self, id: Option<String>) -> LogEntry {
        LogEntry {
            id,
            timestamp: self.timestamp,
            workout: self.workout,
        }
    }
}

// ============================================================================
// Wire Records
// ============================================================================

/// A scalar that may arrive as a JSON number or as text
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn as_millis(&self) -> Option<i64> {
        match self {
            Scalar::Int(n) => Some(*n),
            Scalar::Float(f) if f.is_finite() => Some(f.round() as i64),
            Scalar::Float(_) => None,
            Scalar::Text(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.round() as i64)
                })
            }
        }
    }

    fn into_text(self) -> Option<String> {
        match self {
            Scalar::Int(n) => Some(n.to_string()),
            Scalar::Float(f) => Some(f.to_string()),
            Scalar::Text(s) if s.trim().is_empty() => None,
            Scalar::Text(s) => Some(s),
        }
    }
}

/// A record as delivered by a store, before validation
///
/// Every field is optional so that one malformed row cannot fail a whole
/// load; [`RawEntry::into_entry`] decides what survives ingestion.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawEntry {
    #[serde(default)]
    pub id: Option<Scalar>,
    #[serde(default)]
    pub timestamp: Option<Scalar>,
    #[serde(default)]
    pub workout: Option<String>,
}

impl RawEntry {
    /// Read a record from a JSON value. Only objects count as records;
    /// anything else yields an empty entry that ingestion drops.
    pub fn from_record(record: &serde_json::Value) -> Self {
        if !record.is_object() {
            return Self::default();
        }
        Self::deserialize(record).unwrap_or_default()
    }

    /// Validate into a [`LogEntry`]; `None` when the timestamp is unusable
    /// or the workout is missing or blank
    pub fn into_entry(self) -> Option<LogEntry> {
        let timestamp = self.timestamp.as_ref().and_then(Scalar::as_millis)?;
        let workout = self.workout.filter(|w| !w.trim().is_empty())?;
        Some(LogEntry {
            id: self.id.and_then(Scalar::into_text),
            timestamp,
            workout,
        })
    }
}

/// Run a batch of raw records through ingestion, dropping malformed ones
pub fn ingest(raw: Vec<RawEntry>, source: &str) -> Vec<LogEntry> {
    let total = raw.len();
    let entries: Vec<LogEntry> = raw.into_iter().filter_map(RawEntry::into_entry).collect();
    let skipped = total - entries.len();
    if skipped > 0 {
        tracing::warn!("Skipped {} malformed records from {}", skipped, source);
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> RawEntry {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_rest_day_is_case_insensitive() {
        assert!(is_rest_day("Rest Day"));
        assert!(is_rest_day("rest day"));
        assert!(is_rest_day("REST DAY"));
        assert!(!is_rest_day("Rest"));
    }

    #[test]
    fn test_key_prefers_store_id() {
        let with_id = LogEntry::new(Some("abc".into()), 42, "Legs");
        let without = LogEntry::new(None, 42, "Legs");

        assert_eq!(with_id.key(), EntryKey::Id("abc".into()));
        assert_eq!(without.key(), EntryKey::Timestamp(42));
        assert!(with_id.matches(&EntryKey::Timestamp(42)));
        assert!(!without.matches(&EntryKey::Id("abc".into())));
    }

    #[test]
    fn test_timestamp_accepts_text_and_numbers() {
        let text = raw(r#"{"timestamp": "1700000000000", "workout": "Back"}"#);
        let int = raw(r#"{"timestamp": 1700000000000, "workout": "Back"}"#);
        let float = raw(r#"{"timestamp": 1700000000000.0, "workout": "Back"}"#);

        for entry in [text, int, float] {
            assert_eq!(entry.into_entry().unwrap().timestamp, 1_700_000_000_000);
        }
    }

    #[test]
    fn test_numeric_ids_become_text() {
        let entry = raw(r#"{"id": 17, "timestamp": 1, "workout": "Abs"}"#)
            .into_entry()
            .unwrap();
        assert_eq!(entry.id.as_deref(), Some("17"));
    }

    #[test]
    fn test_ingest_drops_malformed_records() {
        let records = vec![
            raw(r#"{"timestamp": 1, "workout": "Chest"}"#),
            raw(r#"{"timestamp": 2}"#),
            raw(r#"{"timestamp": 3, "workout": "  "}"#),
            raw(r#"{"timestamp": "yesterday", "workout": "Legs"}"#),
            raw(r#"{"workout": "Back"}"#),
        ];

        let entries = ingest(records, "test");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].workout, "Chest");
    }

    #[test]
    fn test_only_objects_are_records() {
        let array = serde_json::json!([null, 5, "Legs"]);
        assert!(RawEntry::from_record(&array).into_entry().is_none());

        let wrong_type = serde_json::json!({"timestamp": 5, "workout": 7});
        assert!(RawEntry::from_record(&wrong_type).into_entry().is_none());

        let object = serde_json::json!({"timestamp": 5, "workout": "Legs"});
        assert_eq!(
            RawEntry::from_record(&object).into_entry(),
            Some(LogEntry::new(None, 5, "Legs"))
        );
    }

    #[test]
    fn test_serialized_entry_omits_missing_id() {
        let entry = LogEntry::new(None, 5, "Legs");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("\"id\""));
    }
}
