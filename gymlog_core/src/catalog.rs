//! The user-editable catalog of selectable workouts.
//!
//! The catalog is an ordered list of names. It lives in local preferences
//! and is never synchronized to the log store.

use crate::types::{is_rest_day, REST_DAY};
use serde::{Deserialize, Serialize};

/// Workouts offered when the user has not customized the catalog
pub const DEFAULT_WORKOUTS: [&str; 8] = [
    "Legs",
    "Shoulders",
    "Chest",
    "Triceps",
    "Back",
    "Biceps",
    "Abs",
    REST_DAY,
];

/// Ordered set of workout names
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct WorkoutCatalog {
    workouts: Vec<String>,
}

impl Default for WorkoutCatalog {
    fn default() -> Self {
        Self {
            workouts: DEFAULT_WORKOUTS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl WorkoutCatalog {
    /// Build a catalog from names, dropping blanks and case-insensitive
    /// duplicates while keeping the first spelling
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut catalog = Self { workouts: Vec::new() };
        for name in names {
            catalog.add(name.as_ref());
        }
        catalog
    }

    pub fn names(&self) -> &[String] {
        &self.workouts
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.workouts.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.workouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workouts.is_empty()
    }

    /// Catalog names that count as exercise (everything but the rest day)
    pub fn exercises(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|w| !is_rest_day(w))
    }

    /// Case-insensitive lookup returning the catalog's own spelling
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        self.iter().find(|w| w.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Append a workout. Returns `false` for blank names and for names
    /// already present under any casing.
    pub fn add(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.contains(name) {
            return false;
        }
        self.workouts.push(name.to_string());
        true
    }

    /// Remove a workout by exact name
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.workouts.len();
        self.workouts.retain(|w| w != name);
        self.workouts.len() != before
    }

    /// Restore the default workouts
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
