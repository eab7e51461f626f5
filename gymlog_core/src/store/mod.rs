//! Log store client and backends.
//!
//! A [`LogStore`] is one place the workout log can live. [`LogClient`]
//! wraps the configured store and is what the rest of the crate talks to:
//! it enforces capability flags, retries transport failures when asked
//! to, and falls back to a local snapshot when a load fails.

mod graphql;
mod http;
mod json_bin;
mod local;
mod retry;
mod sheet;
mod snapshot;

pub use graphql::GraphqlStore;
pub use json_bin::JsonBinStore;
pub use local::LocalStore;
pub use retry::RetryPolicy;
pub use sheet::SheetStore;
pub use snapshot::SnapshotCache;

use crate::config::StoreConfig;
use crate::{Config, EntryKey, LogEntry, NewEntry, Result, SyncError, SyncResult};
use async_trait::async_trait;

/// Operations a backend implements beyond load and create
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub update: bool,
    pub delete: bool,
}

impl Capabilities {
    pub const FULL: Capabilities = Capabilities {
        update: true,
        delete: true,
    };

    pub const APPEND_ONLY: Capabilities = Capabilities {
        update: false,
        delete: false,
    };
}

/// What a store hands back after a successful create
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Created {
    /// The stored record, including any identity the store assigned
    Record(LogEntry),
    /// The store accepted the entry but returned no body
    Acknowledged,
}

/// A backing store for the workout log
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Short backend name for messages and logs
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Fetch every record, dropping malformed ones
    async fn fetch_all(&self) -> SyncResult<Vec<LogEntry>>;

    async fn create(&self, entry: &NewEntry) -> SyncResult<Created>;

    /// Replace the workout of the record addressed by `key`
    async fn update(&self, key: &EntryKey, workout: &str) -> SyncResult<()>;

    async fn delete(&self, key: &EntryKey) -> SyncResult<()>;
}

/// Where the entries of a [`LoadOutcome`] came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadSource {
    Remote,
    Cache,
    Empty,
}

/// Result of [`LogClient::load_all`]; a failed load still yields entries
#[derive(Clone, Debug)]
pub struct LoadOutcome {
    pub entries: Vec<LogEntry>,
    pub source: LoadSource,
    /// Set when the store could not be loaded
    pub failure: Option<SyncError>,
}

impl LoadOutcome {
    /// Whether the entries reflect the store's current contents
    pub fn is_authoritative(&self) -> bool {
        self.source == LoadSource::Remote
    }
}

/// Uniform client over whichever store is configured
pub struct LogClient {
    store: Box<dyn LogStore>,
    retry: RetryPolicy,
    snapshot: Option<SnapshotCache>,
}

impl LogClient {
    pub fn new(store: Box<dyn LogStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
            snapshot: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fall back to (and keep refreshing) a local copy of the log
    pub fn with_snapshot(mut self, snapshot: SnapshotCache) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn backend(&self) -> &'static str {
        self.store.name()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.store.capabilities()
    }

    /// Load the full log. Never fails: on error the outcome carries the
    /// cached snapshot (or nothing) together with the failure.
    pub async fn load_all(&self) -> LoadOutcome {
        match self.retry.run("load", || self.store.fetch_all()).await {
            Ok(entries) => {
                tracing::info!("Loaded {} entries from {} store", entries.len(), self.backend());
                if let Some(snapshot) = &self.snapshot {
                    if let Err(e) = snapshot.save(&entries) {
                        tracing::warn!("Failed to refresh log snapshot: {}", e);
                    }
                }
                LoadOutcome {
                    entries,
                    source: LoadSource::Remote,
                    failure: None,
                }
            }
            Err(err) => {
                tracing::warn!("Loading from {} store failed: {}", self.backend(), err);
                let cached = self.snapshot.as_ref().and_then(|snapshot| match snapshot.load() {
                    Ok(entries) => entries,
                    Err(e) => {
                        tracing::warn!("Failed to read log snapshot: {}", e);
                        None
                    }
                });
                match cached {
                    Some(entries) => LoadOutcome {
                        entries,
                        source: LoadSource::Cache,
                        failure: Some(err),
                    },
                    None => LoadOutcome {
                        entries: Vec::new(),
                        source: LoadSource::Empty,
                        failure: Some(err),
                    },
                }
            }
        }
    }

    pub async fn create(&self, entry: &NewEntry) -> SyncResult<Created> {
        tracing::debug!("Creating {} entry at {}", entry.workout, entry.timestamp);
        self.retry.run("create", || self.store.create(entry)).await
    }

    pub async fn update(&self, key: &EntryKey, workout: &str) -> SyncResult<()> {
        if !self.capabilities().update {
            return Err(self.unsupported("update"));
        }
        tracing::debug!("Updating entry with {} to {}", key, workout);
        self.retry.run("update", || self.store.update(key, workout)).await
    }

    pub async fn delete(&self, key: &EntryKey) -> SyncResult<()> {
        if !self.capabilities().delete {
            return Err(self.unsupported("delete"));
        }
        tracing::debug!("Deleting entry with {}", key);
        self.retry.run("delete", || self.store.delete(key)).await
    }

    fn unsupported(&self, operation: &'static str) -> SyncError {
        SyncError::Unsupported {
            backend: self.backend(),
            operation,
        }
    }
}

/// Build the client for the configured backend
pub fn open(config: &Config) -> Result<LogClient> {
    let store: Box<dyn LogStore> = match &config.store {
        StoreConfig::Local => Box::new(LocalStore::new(config.local_log_path())),
        StoreConfig::Sheet { url, append_only } => Box::new(SheetStore::new(
            http::build_client(config.sync.timeout())?,
            url.clone(),
            *append_only,
        )),
        StoreConfig::JsonBin {
            base_url,
            bin_id,
            master_key,
        } => Box::new(JsonBinStore::new(
            http::build_client(config.sync.timeout())?,
            base_url.clone(),
            bin_id.clone(),
            master_key.clone(),
        )),
        StoreConfig::Graphql { endpoint, token } => Box::new(GraphqlStore::new(
            http::build_client(config.sync.timeout())?,
            endpoint.clone(),
            token.clone(),
        )),
    };

    let mut client = LogClient::new(store).with_retry(RetryPolicy::from(&config.retry));
    if config.store.is_remote() && config.sync.cache {
        client = client.with_snapshot(SnapshotCache::new(config.snapshot_path()));
    }

    tracing::debug!("Opened {} log store", client.backend());
    Ok(client)
}
