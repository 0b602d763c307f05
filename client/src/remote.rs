//! Remote API access.
//!
//! [`RemoteApi`] is the seam the orchestrator is generic over. [`HttpRemote`]
//! talks to a stocksync server (or any API with the same contract) over
//! HTTP with `reqwest`.

use crate::config::Endpoint;
use crate::error::RemoteFailure;
use reqwest::{RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use stocksync_engine::{EntityType, PushReceipt, RemoteRecord, SyncableRecord, Timestamp};

/// Push and pull records against a remote.
pub trait RemoteApi: Send + Sync + 'static {
    /// Create or update one record remotely.
    ///
    /// Records that already carry a `remote_id` are updated, the rest created.
    /// The receipt names the remote identifier and, when the remote reports
    /// them, the version and timestamp it stored.
    fn push(
        &self,
        endpoint: &Endpoint,
        entity: EntityType,
        record: &SyncableRecord,
    ) -> impl Future<Output = Result<PushReceipt, RemoteFailure>> + Send;

    /// Fetch every record of `entity` updated at or after `since`.
    ///
    /// `None` fetches everything.
    fn pull(
        &self,
        endpoint: &Endpoint,
        entity: EntityType,
        since: Option<Timestamp>,
    ) -> impl Future<Output = Result<Vec<RemoteRecord>, RemoteFailure>> + Send;
}

/// HTTP implementation of [`RemoteApi`].
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
}

impl HttpRemote {
    /// Create a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, RemoteFailure> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteFailure::Unreachable(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing `reqwest` client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn authorized(&self, builder: RequestBuilder, endpoint: &Endpoint) -> RequestBuilder {
        builder
            .bearer_auth(&endpoint.api_key)
            .header("Accept", "application/json")
    }

    async fn send(builder: RequestBuilder) -> Result<reqwest::Response, RemoteFailure> {
        let response = builder.send().await.map_err(transport_failure)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteFailure::Rejected {
                status: status.as_u16(),
                message: parse_api_error(status, &body),
            });
        }

        Ok(response)
    }

    /// Decode a successful response. A body that does not parse is the
    /// remote's fault, not the network's.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RemoteFailure> {
        let status = response.status();
        let body = response.text().await.map_err(transport_failure)?;
        serde_json::from_str(&body).map_err(|e| RemoteFailure::Rejected {
            status: status.as_u16(),
            message: format!("malformed response: {e}"),
        })
    }
}

impl RemoteApi for HttpRemote {
    async fn push(
        &self,
        endpoint: &Endpoint,
        entity: EntityType,
        record: &SyncableRecord,
    ) -> Result<PushReceipt, RemoteFailure> {
        let builder = match &record.remote_id {
            Some(remote_id) => self.client.put(format!(
                "{}/{}/{}",
                endpoint.base_url,
                entity.path(),
                remote_id
            )),
            None => self
                .client
                .post(format!("{}/{}", endpoint.base_url, entity.path())),
        };
        let builder = self.authorized(builder, endpoint).json(&record.to_wire());

        let response = Self::send(builder).await?;
        let receipt: PushReceipt = Self::decode(response).await?;

        tracing::debug!(%entity, local_id = %record.id, remote_id = %receipt.id, "Pushed record");
        Ok(receipt)
    }

    async fn pull(
        &self,
        endpoint: &Endpoint,
        entity: EntityType,
        since: Option<Timestamp>,
    ) -> Result<Vec<RemoteRecord>, RemoteFailure> {
        let mut builder = self
            .client
            .get(format!("{}/{}", endpoint.base_url, entity.path()));
        if let Some(since) = since {
            builder = builder.query(&[("since", since.to_rfc3339())]);
        }
        let builder = self.authorized(builder, endpoint);

        let response = Self::send(builder).await?;
        let records: Vec<RemoteRecord> = Self::decode(response).await?;

        tracing::debug!(%entity, count = records.len(), "Pulled records");
        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<Value>,
    message: Option<String>,
}

fn transport_failure(error: reqwest::Error) -> RemoteFailure {
    RemoteFailure::Unreachable(error.to_string())
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        let error = payload.error.and_then(|e| match e {
            Value::String(s) => Some(s),
            _ => None,
        });
        if let Some(message) = payload.message.or(error) {
            return message.trim().to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        trimmed.to_string()
    }
}
