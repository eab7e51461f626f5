//! Spreadsheet web app backend.
//!
//! The sheet is fronted by a small web app: `GET` returns every row, and
//! mutations are `POST`ed as `{action, data}` commands answered with
//! `{status, message}`. Rows carry no ids, so entries are addressed by
//! their timestamp.

use super::http::{expect_success, read_json};
use super::{Capabilities, Created, LogStore};
use crate::{ingest, EntryKey, LogEntry, NewEntry, RawEntry, SyncError, SyncResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

pub struct SheetStore {
    client: Client,
    url: String,
    append_only: bool,
}

/// Reply to a mutation command
#[derive(Debug, Default, Deserialize)]
struct SheetReply {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl SheetStore {
    pub fn new(client: Client, url: impl Into<String>, append_only: bool) -> Self {
        Self {
            client,
            url: url.into(),
            append_only,
        }
    }

    /// Send one `{action, data}` command and interpret the reply
    async fn command(&self, action: &str, data: Value, key: Option<&EntryKey>) -> SyncResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "action": action, "data": data }))
            .send()
            .await?;
        let response = expect_success(response).await?;

        // Some deployments answer with an empty body
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(());
        }
        let reply: SheetReply = serde_json::from_str(&body).map_err(|e| {
            SyncError::rejected(None, format!("malformed {} reply: {}", action, e))
        })?;

        interpret(action, reply, key)
    }

    fn require_timestamp(&self, key: &EntryKey) -> SyncResult<i64> {
        match key {
            EntryKey::Timestamp(ts) => Ok(*ts),
            // Rows have no ids, so an id can never resolve
            EntryKey::Id(_) => Err(SyncError::NotFound(key.clone())),
        }
    }

    fn unsupported(&self, operation: &'static str) -> SyncError {
        SyncError::Unsupported {
            backend: self.name(),
            operation,
        }
    }
}

fn interpret(action: &str, reply: SheetReply, key: Option<&EntryKey>) -> SyncResult<()> {
    if !reply
        .status
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case("error"))
    {
        return Ok(());
    }

    let message = reply
        .message
        .unwrap_or_else(|| format!("{} failed", action));
    match key {
        Some(key) if message.to_lowercase().contains("not found") => {
            Err(SyncError::NotFound(key.clone()))
        }
        _ => Err(SyncError::rejected(None, message)),
    }
}

#[async_trait]
impl LogStore for SheetStore {
    fn name(&self) -> &'static str {
        "sheet"
    }

    fn capabilities(&self) -> Capabilities {
        if self.append_only {
            Capabilities::APPEND_ONLY
        } else {
            Capabilities::FULL
        }
    }

    async fn fetch_all(&self) -> SyncResult<Vec<LogEntry>> {
        let response = self.client.get(&self.url).send().await?;
        let response = expect_success(response).await?;
        let rows: Vec<Value> = read_json(response).await?;
        let raw = rows
            .into_iter()
            .map(|row| RawEntry::from_record(&row))
            .collect();
        Ok(ingest(raw, self.name()))
    }

    async fn create(&self, entry: &NewEntry) -> SyncResult<Created> {
        self.command("create", json!(entry), None).await?;
        Ok(Created::Acknowledged)
    }

    async fn update(&self, key: &EntryKey, workout: &str) -> SyncResult<()> {
        if self.append_only {
            return Err(self.unsupported("update"));
        }
        let timestamp = self.require_timestamp(key)?;
        self.command(
            "update",
            json!({ "timestamp": timestamp, "newWorkout": workout }),
            Some(key),
        )
        .await
    }

    async fn delete(&self, key: &EntryKey) -> SyncResult<()> {
        if self.append_only {
            return Err(self.unsupported("delete"));
        }
        let timestamp = self.require_timestamp(key)?;
        self.command("delete", json!({ "timestamp": timestamp }), Some(key))
            .await
    }
}
