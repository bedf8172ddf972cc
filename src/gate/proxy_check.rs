//! Proxy/VPN reputation lookups.
//!
//! # Responsibilities
//! - Query the reputation service (proxycheck.io v2 API) for one IP
//! - Decide whether that exact IP is a detected proxy/VPN
//!
//! # Design Decisions
//! - Fail-open: no client (no API key) or no IP means "not a proxy"
//! - Lookup failures are returned to the caller, never masked as "not a proxy"
//! - The client is built once at startup and shared read-only

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::observability::metrics;

/// Query options for a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOptions {
    /// VPN detection sensitivity (0 disables VPN detection, 3 is strictest).
    pub vpn: u8,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self { vpn: 2 }
    }
}

/// Reputation record for one address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IpRecord {
    /// `"yes"` when the address is a detected proxy.
    pub proxy: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl IpRecord {
    pub fn is_proxy(&self) -> bool {
        self.proxy.as_deref() == Some("yes")
    }
}

/// Records keyed by the queried address string.
pub type CheckResult = HashMap<String, IpRecord>;

#[derive(Debug, Error)]
pub enum ProxyCheckError {
    #[error("reputation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("reputation service returned status {0}")]
    Status(u16),

    #[error("reputation service error: {0}")]
    Service(String),

    #[error("invalid reputation response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid reputation service URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Looks up the reputation of client addresses.
#[async_trait]
pub trait ProxyChecker: Send + Sync {
    async fn check_ip(&self, ip: &str, options: CheckOptions) -> Result<CheckResult, ProxyCheckError>;
}

/// HTTP client for the proxycheck.io v2 API.
pub struct ProxyCheckClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl fmt::Debug for ProxyCheckClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCheckClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ProxyCheckClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ProxyCheckError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: Url::parse(base_url)?,
            api_key: api_key.into(),
        })
    }

    fn lookup_url(&self, ip: &str, options: CheckOptions) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("v2").push(ip);
        }
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("vpn", &options.vpn.to_string());
        url
    }
}

#[async_trait]
impl ProxyChecker for ProxyCheckClient {
    async fn check_ip(&self, ip: &str, options: CheckOptions) -> Result<CheckResult, ProxyCheckError> {
        let response = self.client.get(self.lookup_url(ip, options)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProxyCheckError::Status(status.as_u16()));
        }

        let body: Value = response.json().await?;
        parse_response(body)
    }
}

/// Split a v2 response into per-address records.
///
/// Top-level keys that are not address records (`status`, `message`, ...) are
/// skipped. `status: "error"` fails the whole lookup.
fn parse_response(body: Value) -> Result<CheckResult, ProxyCheckError> {
    let Value::Object(fields) = body else {
        return Err(ProxyCheckError::Service("response is not an object".to_string()));
    };

    if fields.get("status").and_then(Value::as_str) == Some("error") {
        let message = fields
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(ProxyCheckError::Service(message.to_string()));
    }

    let mut records = CheckResult::new();
    for (key, value) in fields {
        if value.is_object() {
            records.insert(key, serde_json::from_value(value)?);
        }
    }
    Ok(records)
}

/// Proxy/VPN predicate of the gate.
pub async fn is_proxy_blocked(
    checker: Option<&dyn ProxyChecker>,
    ip: Option<IpAddr>,
    options: CheckOptions,
) -> Result<bool, ProxyCheckError> {
    let (Some(checker), Some(ip)) = (checker, ip) else {
        return Ok(false);
    };

    let key = ip.to_string();
    match checker.check_ip(&key, options).await {
        Ok(result) => {
            let blocked = result.get(&key).is_some_and(IpRecord::is_proxy);
            metrics::record_proxy_check(if blocked { "proxy" } else { "clean" });
            Ok(blocked)
        }
        Err(e) => {
            metrics::record_proxy_check("error");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StaticChecker {
        body: Value,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ProxyChecker for StaticChecker {
        async fn check_ip(&self, _ip: &str, options: CheckOptions) -> Result<CheckResult, ProxyCheckError> {
            assert_eq!(options.vpn, 2);
            self.calls.fetch_add(1, Ordering::SeqCst);
            parse_response(self.body.clone())
        }
    }

    fn checker(body: Value) -> StaticChecker {
        StaticChecker {
            body,
            calls: AtomicU32::new(0),
        }
    }

    #[test]
    fn test_lookup_url() {
        let client = ProxyCheckClient::new("https://proxycheck.io", "k3y", None).unwrap();
        assert_eq!(
            client.lookup_url("203.0.113.7", CheckOptions::default()).as_str(),
            "https://proxycheck.io/v2/203.0.113.7?key=k3y&vpn=2"
        );
        assert!(!format!("{:?}", client).contains("k3y"));
    }

    #[test]
    fn test_parse_response() {
        let records = parse_response(json!({
            "status": "ok",
            "203.0.113.7": {"proxy": "yes", "type": "VPN"},
        }))
        .unwrap();
        assert_eq!(records.len(), 1);
        assert!(records["203.0.113.7"].is_proxy());
        assert_eq!(records["203.0.113.7"].kind.as_deref(), Some("VPN"));

        let err = parse_response(json!({"status": "error", "message": "bad key"})).unwrap_err();
        assert_eq!(err.to_string(), "reputation service error: bad key");
    }

    #[tokio::test]
    async fn test_fail_open_without_checker_or_ip() {
        let ip: IpAddr = "203.0.113.7".parse().unwrap();
        assert!(!is_proxy_blocked(None, Some(ip), CheckOptions::default()).await.unwrap());

        let checker = checker(json!({"203.0.113.7": {"proxy": "yes"}}));
        assert!(!is_proxy_blocked(Some(&checker), None, CheckOptions::default()).await.unwrap());
        assert_eq!(checker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_only_exact_ip_record_counts() {
        let ip: IpAddr = "203.0.113.7".parse().unwrap();

        let flagged = checker(json!({"status": "ok", "203.0.113.7": {"proxy": "yes"}}));
        assert!(is_proxy_blocked(Some(&flagged), Some(ip), CheckOptions::default()).await.unwrap());

        let other_ip = checker(json!({"status": "ok", "198.51.100.1": {"proxy": "yes"}}));
        assert!(!is_proxy_blocked(Some(&other_ip), Some(ip), CheckOptions::default()).await.unwrap());

        let clean = checker(json!({"status": "ok", "203.0.113.7": {"proxy": "no"}}));
        assert!(!is_proxy_blocked(Some(&clean), Some(ip), CheckOptions::default()).await.unwrap());
    }

    #[tokio::test]
    async fn test_lookup_error_propagates() {
        let ip: IpAddr = "203.0.113.7".parse().unwrap();
        let failing = checker(json!({"status": "error", "message": "quota exceeded"}));
        let result = is_proxy_blocked(Some(&failing), Some(ip), CheckOptions::default()).await;
        assert!(matches!(result, Err(ProxyCheckError::Service(_))));
    }
}
