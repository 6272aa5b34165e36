//! HTTP store client
//!
//! Talks to a PostgREST-style table API:
//!
//! | Operation          | Request                                         |
//! |--------------------|-------------------------------------------------|
//! | `list`             | `GET    /rest/v1/{table}?select=*&order=created_at.desc` |
//! | `insert`           | `POST   /rest/v1/{table}` (returns the row)     |
//! | `update`           | `PATCH  /rest/v1/{table}?id=eq.{id}`            |
//! | `delete`           | `DELETE /rest/v1/{table}?id=eq.{id}`            |
//! | `delete_completed` | `DELETE /rest/v1/{table}?completed=eq.true`     |
//!
//! Every request carries the access key as both `apikey` and bearer token.
//! Change notifications come from the realtime WebSocket (see
//! [`crate::realtime`]).

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{RemoteStore, StoreError, StoreResult, Subscription};
use crate::config::StoreSettings;
use crate::models::{NewTask, Task, TaskId, TaskPatch};
use crate::realtime::{self, RealtimeConfig};

const USER_AGENT: &str = concat!("tend/", env!("CARGO_PKG_VERSION"));

/// Asks the API to echo the affected rows
const RETURN_REPRESENTATION: &str = "return=representation";

/// Remote store reached over HTTP
pub struct RestStore {
    /// `None` when running without configuration; every call then fails
    settings: Option<StoreSettings>,
    client: Client,
    realtime_enabled: bool,
}

impl RestStore {
    /// Create a client for a configured store
    pub fn new(settings: StoreSettings) -> StoreResult<Self> {
        let client = build_client(&settings.key)?;
        Ok(Self {
            settings: Some(settings),
            client,
            realtime_enabled: true,
        })
    }

    /// Create a client that rejects every call with `NotConfigured`
    pub fn unconfigured() -> Self {
        Self {
            settings: None,
            client: Client::new(),
            realtime_enabled: false,
        }
    }

    /// Create a configured client, or an unconfigured one if `settings` is `None`
    pub fn from_settings(settings: Option<StoreSettings>) -> StoreResult<Self> {
        match settings {
            Some(s) => Self::new(s),
            None => Ok(Self::unconfigured()),
        }
    }

    /// Enable or disable the push channel
    pub fn with_realtime(mut self, enabled: bool) -> Self {
        self.realtime_enabled = enabled;
        self
    }

    /// True if URL and key are present
    pub fn is_configured(&self) -> bool {
        self.settings.is_some()
    }

    fn settings(&self) -> StoreResult<&StoreSettings> {
        self.settings.as_ref().ok_or(StoreError::NotConfigured)
    }

    fn endpoint(&self) -> StoreResult<String> {
        Ok(self.settings()?.rest_endpoint())
    }

    /// Send a request and fail on non-success status
    async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
        warn!("Store request failed with {}: {}", status, message);
        Err(StoreError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    /// Send a request and decode the JSON body
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> StoreResult<T> {
        let body = self.send(request).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn list(&self) -> StoreResult<Vec<Task>> {
        let endpoint = self.endpoint()?;
        debug!("GET {}", endpoint);
        let request = self
            .client
            .get(&endpoint)
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        self.send_json(request).await
    }

    async fn insert(&self, task: &NewTask) -> StoreResult<Task> {
        let endpoint = self.endpoint()?;
        debug!("POST {}", endpoint);
        let request = self
            .client
            .post(&endpoint)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(task);
        let rows: Vec<Task> = self.send_json(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no rows".to_string()))
    }

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> StoreResult<Task> {
        let endpoint = self.endpoint()?;
        debug!("PATCH {} id={}", endpoint, id);
        let request = self
            .client
            .patch(&endpoint)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(patch);
        let rows: Vec<Task> = self.send_json(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn delete(&self, id: &TaskId) -> StoreResult<()> {
        let endpoint = self.endpoint()?;
        debug!("DELETE {} id={}", endpoint, id);
        let request = self
            .client
            .delete(&endpoint)
            .query(&[("id", format!("eq.{}", id))]);
        self.send(request).await?;
        Ok(())
    }

    async fn delete_completed(&self) -> StoreResult<()> {
        let endpoint = self.endpoint()?;
        debug!("DELETE {} completed=eq.true", endpoint);
        let request = self
            .client
            .delete(&endpoint)
            .query(&[("completed", "eq.true")]);
        self.send(request).await?;
        Ok(())
    }

    async fn subscribe(&self) -> StoreResult<Subscription> {
        let settings = self.settings()?;
        if !self.realtime_enabled {
            // Producer half is dropped, so the feed ends immediately
            let (subscription, _parts) = Subscription::pair(1);
            return Ok(subscription);
        }
        let config = RealtimeConfig::from_settings(settings)?;
        Ok(realtime::subscribe(config))
    }
}

fn build_client(key: &str) -> StoreResult<Client> {
    let mut headers = HeaderMap::new();
    let api_key = HeaderValue::from_str(key).map_err(|_| StoreError::InvalidKey)?;
    let bearer =
        HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|_| StoreError::InvalidKey)?;
    headers.insert("apikey", api_key);
    headers.insert(AUTHORIZATION, bearer);

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()?;
    Ok(client)
}

/// Pull a readable message out of an error body
///
/// The API returns `{"message": ..., "details": ..., "hint": ...}`; anything
/// else is passed through trimmed.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "msg", "error_description", "error"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
                return Some(msg.to_string());
            }
        }
    }

    Some(body.to_string())
}
