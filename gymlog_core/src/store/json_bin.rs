//! Whole-document JSON bin backend.
//!
//! The log is a single JSON array stored in a bin. Reads fetch the latest
//! version; every mutation is a read-modify-write of the whole array.
//! Records are kept as raw JSON so fields this crate does not know about
//! (and rows it cannot parse) survive a write.

use super::http::{expect_success, read_json};
use super::{Capabilities, Created, LogStore};
use crate::{ingest, EntryKey, LogEntry, NewEntry, RawEntry, SyncError, SyncResult};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};

const MASTER_KEY_HEADER: &str = "X-Master-Key";

pub struct JsonBinStore {
    client: Client,
    base_url: String,
    bin_id: String,
    master_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BinEnvelope {
    #[serde(default)]
    record: Option<Vec<Value>>,
}

impl JsonBinStore {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        bin_id: impl Into<String>,
        master_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            bin_id: bin_id.into(),
            master_key,
        }
    }

    fn bin_url(&self) -> String {
        format!("{}/b/{}", self.base_url.trim_end_matches('/'), self.bin_id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.master_key {
            Some(key) => request.header(MASTER_KEY_HEADER, key),
            None => request,
        }
    }

    async fn read_records(&self) -> SyncResult<Vec<Value>> {
        let request = self.client.get(format!("{}/latest", self.bin_url()));
        let response = self.authorize(request).send().await?;
        let response = expect_success(response).await?;
        let envelope: BinEnvelope = read_json(response).await?;
        Ok(envelope.record.unwrap_or_default())
    }

    async fn write_records(&self, records: &[Value]) -> SyncResult<()> {
        let request = self.client.put(self.bin_url()).json(records);
        let response = self.authorize(request).send().await?;
        expect_success(response).await?;
        tracing::debug!("Wrote {} records to bin {}", records.len(), self.bin_id);
        Ok(())
    }

    /// Index of the first record `key` addresses
    fn position(records: &[Value], key: &EntryKey) -> SyncResult<usize> {
        records
            .iter()
            .position(|record| {
                RawEntry::from_record(record)
                    .into_entry()
                    .is_some_and(|entry| entry.matches(key))
            })
            .ok_or_else(|| SyncError::NotFound(key.clone()))
    }
}

#[async_trait]
impl LogStore for JsonBinStore {
    fn name(&self) -> &'static str {
        "json_bin"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FULL
    }

    async fn fetch_all(&self) -> SyncResult<Vec<LogEntry>> {
        let records = self.read_records().await?;
        let raw = records
            .into_iter()
            .map(|record| RawEntry::from_record(&record))
            .collect();
        Ok(ingest(raw, self.name()))
    }

    async fn create(&self, entry: &NewEntry) -> SyncResult<Created> {
        let mut records = self.read_records().await?;
        records.push(json!(entry));
        self.write_records(&records).await?;
        Ok(Created::Acknowledged)
    }

    async fn update(&self, key: &EntryKey, workout: &str) -> SyncResult<()> {
        let mut records = self.read_records().await?;
        let index = Self::position(&records, key)?;
        let record = records[index].as_object_mut().ok_or_else(|| {
            SyncError::rejected(None, format!("record with {} is not an object", key))
        })?;
        record.insert("workout".to_string(), json!(workout));
        self.write_records(&records).await
    }

    async fn delete(&self, key: &EntryKey) -> SyncResult<()> {
        let mut records = self.read_records().await?;
        let index = Self::position(&records, key)?;
        records.remove(index);
        self.write_records(&records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::serve;
    use axum::{
        extract::State,
        http::{HeaderMap, StatusCode},
        routing::{get, put},
        Json, Router,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct Bin {
        records: Mutex<Vec<Value>>,
        writes: AtomicUsize,
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get(MASTER_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            == Some("secret")
    }

    async fn latest(
        State(bin): State<Arc<Bin>>,
        headers: HeaderMap,
    ) -> Result<Json<Value>, StatusCode> {
        if !authorized(&headers) {
            return Err(StatusCode::UNAUTHORIZED);
        }
        let records = bin.records.lock().unwrap().clone();
        Ok(Json(json!({ "record": records, "metadata": { "private": true } })))
    }

    async fn replace(
        State(bin): State<Arc<Bin>>,
        headers: HeaderMap,
        Json(records): Json<Vec<Value>>,
    ) -> Result<Json<Value>, StatusCode> {
        if !authorized(&headers) {
            return Err(StatusCode::UNAUTHORIZED);
        }
        bin.writes.fetch_add(1, Ordering::SeqCst);
        *bin.records.lock().unwrap() = records.clone();
        Ok(Json(json!({ "record": records })))
    }

    async fn bin_server(records: Vec<Value>) -> (String, Arc<Bin>) {
        let bin = Arc::new(Bin {
            records: Mutex::new(records),
            writes: AtomicUsize::new(0),
        });
        let router = Router::new()
            .route("/v3/b/:id/latest", get(latest))
            .route("/v3/b/:id", put(replace))
            .with_state(Arc::clone(&bin));
        (format!("{}/v3", serve(router).await), bin)
    }

    fn store(base_url: &str, key: Option<&str>) -> JsonBinStore {
        let client = crate::store::http::build_client(Duration::from_secs(5)).unwrap();
        JsonBinStore::new(client, base_url, "log-bin", key.map(str::to_string))
    }

    #[tokio::test]
    async fn test_create_then_fetch() {
        let (url, _bin) = bin_server(vec![]).await;
        let store = store(&url, Some("secret"));

        let created = store
            .create(&NewEntry {
                timestamp: 1_700_000_000_000,
                workout: "Biceps".into(),
            })
            .await
            .unwrap();
        assert_eq!(created, Created::Acknowledged);

        let entries = store.fetch_all().await.unwrap();
        assert_eq!(entries, vec![LogEntry::new(None, 1_700_000_000_000, "Biceps")]);
    }

    #[tokio::test]
    async fn test_update_keeps_unknown_fields() {
        let (url, bin) = bin_server(vec![
            json!({"timestamp": 1, "workout": "Legs", "note": "heavy"}),
            json!({"garbage": true}),
        ])
        .await;
        let store = store(&url, Some("secret"));

        store.update(&EntryKey::Timestamp(1), "Back").await.unwrap();

        let records = bin.records.lock().unwrap().clone();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["workout"], "Back");
        assert_eq!(records[0]["note"], "heavy");
    }

    #[tokio::test]
    async fn test_delete_unknown_key_writes_nothing() {
        let (url, bin) = bin_server(vec![json!({"timestamp": 1, "workout": "Legs"})]).await;
        let store = store(&url, Some("secret"));

        let err = store.delete(&EntryKey::Timestamp(2)).await.unwrap_err();
        assert_eq!(err, SyncError::NotFound(EntryKey::Timestamp(2)));
        assert_eq!(bin.writes.load(Ordering::SeqCst), 0);

        store.delete(&EntryKey::Timestamp(1)).await.unwrap();
        assert!(store.fetch_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_array_rows_are_not_records() {
        let (url, bin) = bin_server(vec![
            json!([null, 5, "Legs"]),
            json!({"timestamp": 6, "workout": "Back"}),
        ])
        .await;
        let store = store(&url, Some("secret"));

        let entries = store.fetch_all().await.unwrap();
        assert_eq!(entries, vec![LogEntry::new(None, 6, "Back")]);

        let err = store.update(&EntryKey::Timestamp(5), "Back").await.unwrap_err();
        assert_eq!(err, SyncError::NotFound(EntryKey::Timestamp(5)));
        assert_eq!(bin.writes.load(Ordering::SeqCst), 0);

        store.update(&EntryKey::Timestamp(6), "Chest").await.unwrap();
        let records = bin.records.lock().unwrap().clone();
        assert_eq!(records[0], json!([null, 5, "Legs"]));
        assert_eq!(records[1]["workout"], "Chest");
    }

    #[tokio::test]
    async fn test_missing_key_is_rejected() {
        let (url, _bin) = bin_server(vec![]).await;
        let err = store(&url, None).fetch_all().await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::ServerRejected {
                status: Some(401),
                ..
            }
        ));
    }
}
