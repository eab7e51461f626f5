//! Shared HTTP plumbing for the remote backends.

use crate::{SyncError, SyncResult};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub(crate) fn build_client(timeout: Duration) -> SyncResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SyncError::Network(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a non-2xx response into [`SyncError::ServerRejected`] carrying the body
pub(crate) async fn expect_success(response: Response) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(SyncError::rejected(Some(status.as_u16()), body))
}

/// Decode a JSON body, reporting garbage as a rejection rather than a
/// transport failure
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> SyncResult<T> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        tracing::debug!("Undecodable response body: {}", body);
        SyncError::rejected(Some(status), format!("malformed response: {}", e))
    })
}
