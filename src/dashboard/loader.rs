//! Dashboard data loader.
//!
//! The loader is the external collaborator that actually produces a
//! dashboard. Its payload is opaque to the cache and the state machine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::dashboard::account::ApiContext;

/// Dashboard payload as produced by the upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DashboardData(pub Value);

impl DashboardData {
    /// False for empty payloads: `null`, `false`, `0` and `""`.
    pub fn is_present(&self) -> bool {
        match &self.0 {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }
}

/// Errors that can occur while loading dashboard data.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Connection or transport failure.
    #[error("dashboard request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Upstream answered with a non-success status.
    #[error("dashboard upstream returned status {0}")]
    Status(u16),

    /// Upstream body was not valid JSON.
    #[error("invalid dashboard payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// Upstream reported a structured error.
    #[error("{0}")]
    Upstream(String),

    /// Upstream failed without a structured error value.
    #[error("dashboard upstream rejected the request")]
    Rejected(Value),
}

impl LoaderError {
    /// Message to surface for this failure, if it carries a structured one.
    pub fn structured_message(&self) -> Option<String> {
        match self {
            LoaderError::Rejected(_) => None,
            other => Some(other.to_string()),
        }
    }
}

/// Produces the dashboard for one stake account.
#[async_trait]
pub trait DashboardLoader: Send + Sync {
    async fn load_data(&self, ctx: &ApiContext) -> Result<DashboardData, LoaderError>;
}

/// Loads dashboards from an HTTP upstream.
///
/// `GET {base}/stake-accounts/{address}/dashboard`
#[derive(Debug, Clone)]
pub struct HttpDashboardLoader {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpDashboardLoader {
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn dashboard_url(&self, ctx: &ApiContext) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("stake-accounts")
                .push(&ctx.stake_account.address.to_base58_string())
                .push("dashboard");
        }
        url
    }
}

#[async_trait]
impl DashboardLoader for HttpDashboardLoader {
    async fn load_data(&self, ctx: &ApiContext) -> Result<DashboardData, LoaderError> {
        let url = self.dashboard_url(ctx);
        tracing::debug!(url = %url, "Loading dashboard data");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(upstream_error(&body).unwrap_or(LoaderError::Status(status.as_u16())));
        }

        let value: Value = serde_json::from_slice(&body)?;
        if let Some(err) = upstream_error_value(&value) {
            return Err(err);
        }
        Ok(DashboardData(value))
    }
}

fn upstream_error(body: &[u8]) -> Option<LoaderError> {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| upstream_error_value(&value))
}

/// Classify an `{"error": ...}` envelope.
fn upstream_error_value(value: &Value) -> Option<LoaderError> {
    let error = value.as_object()?.get("error")?;
    match error {
        Value::Object(fields) => Some(LoaderError::Upstream(
            fields
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        )),
        Value::Null => None,
        other => Some(LoaderError::Rejected(other.clone())),
    }
}
