//! Local preferences persistence with file locking.
//!
//! The workout catalog and the theme choice are device-local settings.
//! They are kept in one JSON file next to the data, separate from the
//! workout log.

use crate::{Error, Result, WorkoutCatalog};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;
use tempfile::NamedTempFile;

/// Display theme preference
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl FromStr for Theme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(Error::Other(format!(
                "Unknown theme: {} (expected light or dark)",
                other
            ))),
        }
    }
}

/// Device-local settings
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Preferences {
    #[serde(default)]
    pub workouts: WorkoutCatalog,

    #[serde(default)]
    pub theme: Theme,
}

impl Preferences {
    /// Load preferences from a file with shared locking
    ///
    /// Returns defaults if the file doesn't exist. A file that cannot be
    /// read or parsed logs a warning and also yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No preferences file found, using defaults");
            return Ok(Self::default());
        }

        let loaded = read_shared(path)
            .map_err(|e| format!("Unable to read preferences {:?}: {}", path, e))
            .and_then(|contents| {
                serde_json::from_str::<Preferences>(&contents)
                    .map_err(|e| format!("Failed to parse preferences {:?}: {}", path, e))
            });

        match loaded {
            Ok(prefs) => {
                tracing::debug!("Loaded preferences from {:?}", path);
                Ok(prefs)
            }
            Err(reason) => {
                tracing::warn!("{}. Using defaults.", reason);
                Ok(Self::default())
            }
        }
    }

    /// Save preferences atomically: temp file, fsync, rename over the original
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path.parent().ok_or_else(|| {
            Error::Other(format!("preferences path {:?} has no parent", path))
        })?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;

        // Serialize concurrent writers on the temp file
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string_pretty(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved preferences to {:?}", path);
        Ok(())
    }

    /// Load preferences, modify them, and save them back
    pub fn update<F>(path: &Path, f: F) -> Result<Self>
    where
        F: FnOnce(&mut Preferences) -> Result<()>,
    {
        let mut prefs = Self::load(path)?;
        f(&mut prefs)?;
        prefs.save(path)?;
        Ok(prefs)
    }
}

/// Read a whole file while holding a shared lock on it
fn read_shared(path: &Path) -> std::io::Result<String> {
    let file = File::open(path)?;
    file.lock_shared()?;

    let mut contents = String::new();
    let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
    file.unlock()?;
    read.map(|_| contents)
}
