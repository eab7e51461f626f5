//! Application state for one session.
//!
//! A [`Tracker`] owns the in-memory log and the client for the configured
//! store. Mutations are applied locally first and then sent to the store:
//! new entries stay provisional until the store confirms them, while
//! edits and deletes are rolled back if the store refuses them.

use crate::stats::{self, WorkoutChoice};
use crate::store::{Capabilities, Created, LoadSource, LogClient};
use crate::{Dashboard, EntryKey, LogEntry, NewEntry, SyncError, SyncResult, WorkoutCatalog};
use chrono::{DateTime, TimeZone, Utc};

/// What a [`Tracker::refresh`] did to the in-memory log
#[derive(Clone, Debug)]
pub struct SyncReport {
    pub source: LoadSource,
    /// Entries now held in memory
    pub loaded: usize,
    /// Provisional entries the store turned out to contain
    pub confirmed: usize,
    /// Provisional entries the store did not contain, now discarded
    pub dropped: usize,
    pub failure: Option<SyncError>,
}

impl SyncReport {
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }
}

pub struct Tracker {
    client: LogClient,
    entries: Vec<LogEntry>,
    /// Entries created locally that the store has not confirmed yet
    pending: Vec<NewEntry>,
    /// Records the store returned on create since the last authoritative load
    recorded: Vec<LogEntry>,
}

impl Tracker {
    /// Start with an empty log; call [`Tracker::refresh`] to load it
    pub fn new(client: LogClient) -> Self {
        Self {
            client,
            entries: Vec::new(),
            pending: Vec::new(),
            recorded: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn backend(&self) -> &'static str {
        self.client.backend()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.client.capabilities()
    }

    /// Number of entries still awaiting confirmation
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn dashboard<Tz: TimeZone>(&self, catalog: &WorkoutCatalog, now: &DateTime<Tz>) -> Dashboard {
        Dashboard::build(&self.entries, catalog, now)
    }

    pub fn choices<Tz: TimeZone>(
        &self,
        catalog: &WorkoutCatalog,
        now: &DateTime<Tz>,
    ) -> Vec<WorkoutChoice> {
        stats::workout_choices(&self.entries, catalog, now)
    }

    /// Reload the log and reconcile provisional entries against it.
    ///
    /// After an authoritative load the store's view replaces the local
    /// one. Otherwise the fallback entries are used, and both provisional
    /// entries and records created since the last authoritative load are
    /// carried over so they are not lost.
    pub async fn refresh(&mut self) -> SyncReport {
        let outcome = self.client.load_all().await;
        let authoritative = outcome.is_authoritative();
        self.entries = outcome.entries;

        let mut confirmed = 0;
        let mut dropped = 0;

        if authoritative {
            self.recorded.clear();
            for provisional in self.pending.drain(..) {
                let present = self.entries.iter().any(|e| {
                    e.timestamp == provisional.timestamp && e.workout == provisional.workout
                });
                if present {
                    confirmed += 1;
                } else {
                    tracing::warn!(
                        "Dropping unconfirmed {} entry at {}",
                        provisional.workout,
                        provisional.timestamp
                    );
                    dropped += 1;
                }
            }
        } else {
            for provisional in &self.pending {
                let present = self.entries.iter().any(|e| {
                    e.timestamp == provisional.timestamp && e.workout == provisional.workout
                });
                if !present {
                    self.entries.push(provisional.clone().into_entry(None));
                }
            }
            for record in &self.recorded {
                let key = record.key();
                if !self.entries.iter().any(|e| e.matches(&key)) {
                    self.entries.push(record.clone());
                }
            }
        }

        tracing::debug!(
            "Refreshed {} entries ({} confirmed, {} dropped, {} pending)",
            self.entries.len(),
            confirmed,
            dropped,
            self.pending.len()
        );

        SyncReport {
            source: outcome.source,
            loaded: self.entries.len(),
            confirmed,
            dropped,
            failure: outcome.failure,
        }
    }

    /// Record a workout at `now`.
    ///
    /// The entry is visible immediately. If the store returns the created
    /// record its identity replaces the provisional one; on failure the
    /// entry stays provisional and the error is returned.
    pub async fn log_workout(&mut self, workout: &str, now: DateTime<Utc>) -> SyncResult<LogEntry> {
        let new_entry = NewEntry::at(workout, now);
        let provisional = new_entry.clone().into_entry(None);
        self.entries.push(provisional.clone());
        self.pending.push(new_entry.clone());

        match self.client.create(&new_entry).await {
            Ok(Created::Record(record)) => {
                if let Some(slot) = self.entries.iter_mut().rev().find(|e| **e == provisional) {
                    *slot = record.clone();
                }
                if let Some(index) = self.pending.iter().position(|p| *p == new_entry) {
                    self.pending.remove(index);
                }
                self.recorded.push(record.clone());
                tracing::info!("Logged {} as {}", record.workout, record.key());
                Ok(record)
            }
            Ok(Created::Acknowledged) => {
                tracing::info!("Logged {} (awaiting confirmation)", workout);
                Ok(provisional)
            }
            Err(e) => {
                tracing::warn!("Failed to store {} entry: {}", workout, e);
                Err(e)
            }
        }
    }

    /// Change the workout of the entry `key` addresses
    pub async fn edit(&mut self, key: &EntryKey, workout: &str) -> SyncResult<()> {
        self.require(self.capabilities().update, "update")?;
        let index = self.position(key)?;

        let previous = std::mem::replace(&mut self.entries[index].workout, workout.to_string());
        if let Err(e) = self.client.update(key, workout).await {
            tracing::warn!("Reverting edit of entry with {}: {}", key, e);
            self.entries[index].workout = previous;
            return Err(e);
        }

        let timestamp = self.entries[index].timestamp;
        for provisional in self.pending.iter_mut().filter(|p| p.timestamp == timestamp) {
            provisional.workout = workout.to_string();
        }
        let edited = self.entries[index].key();
        for record in self.recorded.iter_mut().filter(|r| r.matches(&edited)) {
            record.workout = workout.to_string();
        }
        Ok(())
    }

    /// Delete the entry `key` addresses
    pub async fn remove(&mut self, key: &EntryKey) -> SyncResult<LogEntry> {
        self.require(self.capabilities().delete, "delete")?;
        let index = self.position(key)?;

        let removed = self.entries.remove(index);
        if let Err(e) = self.client.delete(key).await {
            tracing::warn!("Restoring deleted entry with {}: {}", key, e);
            self.entries.insert(index, removed);
            return Err(e);
        }

        self.pending
            .retain(|p| !(p.timestamp == removed.timestamp && p.workout == removed.workout));
        let gone = removed.key();
        self.recorded.retain(|r| !r.matches(&gone));
        Ok(removed)
    }

    fn position(&self, key: &EntryKey) -> SyncResult<usize> {
        self.entries
            .iter()
            .position(|e| e.matches(key))
            .ok_or_else(|| SyncError::NotFound(key.clone()))
    }

    fn require(&self, allowed: bool, operation: &'static str) -> SyncResult<()> {
        if allowed {
            Ok(())
        } else {
            Err(SyncError::Unsupported {
                backend: self.backend(),
                operation,
            })
        }
    }
}
