//! Hosted GraphQL database backend.
//!
//! Records carry server-issued ids. A timestamp key is resolved to an id
//! by looking the entry up before mutating it.

use super::http::{expect_success, read_json};
use super::{Capabilities, Created, LogStore};
use crate::{ingest, EntryKey, LogEntry, NewEntry, RawEntry, SyncError, SyncResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

const LIST_QUERY: &str = "query WorkoutLogs { workoutLogs { id timestamp workout } }";

const CREATE_MUTATION: &str = "mutation CreateWorkoutLog($timestamp: Float!, $workout: String!) { \
     createWorkoutLog(timestamp: $timestamp, workout: $workout) { id timestamp workout } }";

const UPDATE_MUTATION: &str = "mutation UpdateWorkoutLog($id: ID!, $workout: String!) { \
     updateWorkoutLog(id: $id, workout: $workout) { id } }";

const DELETE_MUTATION: &str =
    "mutation DeleteWorkoutLog($id: ID!) { deleteWorkoutLog(id: $id) { id } }";

pub struct GraphqlStore {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListData {
    #[serde(default)]
    workout_logs: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateData {
    create_workout_log: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateData {
    update_workout_log: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteData {
    delete_workout_log: Option<Value>,
}

impl GraphqlStore {
    pub fn new(client: Client, endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            token,
        }
    }

    /// Run one operation and unwrap its `data`
    async fn execute<T: DeserializeOwned>(&self, query: &str, variables: Value) -> SyncResult<T> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = expect_success(request.send().await?).await?;
        let body: GraphqlResponse<T> = read_json(response).await?;

        if !body.errors.is_empty() {
            let messages: Vec<String> = body.errors.into_iter().map(|e| e.message).collect();
            return Err(SyncError::rejected(None, messages.join("; ")));
        }

        body.data
            .ok_or_else(|| SyncError::rejected(None, "response carried no data"))
    }

    /// Translate a key into the server id it addresses
    async fn resolve_id(&self, key: &EntryKey) -> SyncResult<String> {
        match key {
            EntryKey::Id(id) => Ok(id.clone()),
            EntryKey::Timestamp(_) => self
                .fetch_all()
                .await?
                .into_iter()
                .find(|entry| entry.matches(key))
                .and_then(|entry| entry.id)
                .ok_or_else(|| SyncError::NotFound(key.clone())),
        }
    }
}

#[async_trait]
impl LogStore for GraphqlStore {
    fn name(&self) -> &'static str {
        "graphql"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FULL
    }

    async fn fetch_all(&self) -> SyncResult<Vec<LogEntry>> {
        let data: ListData = self.execute(LIST_QUERY, json!({})).await?;
        let raw = data
            .workout_logs
            .unwrap_or_default()
            .iter()
            .map(RawEntry::from_record)
            .collect();
        Ok(ingest(raw, self.name()))
    }

    async fn create(&self, entry: &NewEntry) -> SyncResult<Created> {
        let data: CreateData = self
            .execute(
                CREATE_MUTATION,
                json!({ "timestamp": entry.timestamp, "workout": entry.workout }),
            )
            .await?;

        match data
            .create_workout_log
            .and_then(|record| RawEntry::from_record(&record).into_entry())
        {
            Some(record) => Ok(Created::Record(record)),
            None => Ok(Created::Acknowledged),
        }
    }

    async fn update(&self, key: &EntryKey, workout: &str) -> SyncResult<()> {
        let id = self.resolve_id(key).await?;
        let data: UpdateData = self
            .execute(UPDATE_MUTATION, json!({ "id": id, "workout": workout }))
            .await?;
        match data.update_workout_log {
            Some(Value::Null) | None => Err(SyncError::NotFound(key.clone())),
            Some(_) => Ok(()),
        }
    }

    async fn delete(&self, key: &EntryKey) -> SyncResult<()> {
        let id = self.resolve_id(key).await?;
        let data: DeleteData = self.execute(DELETE_MUTATION, json!({ "id": id })).await?;
        match data.delete_workout_log {
            Some(Value::Null) | None => Err(SyncError::NotFound(key.clone())),
            Some(_) => Ok(()),
        }
    }
}
