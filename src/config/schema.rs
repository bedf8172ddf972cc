//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the staking gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request gate (proxy, region and segment checks).
    pub gate: GateConfig,

    /// Dashboard data cache and upstream loader.
    pub dashboard: DashboardConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Request gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GateConfig {
    /// Region codes (ISO 3166-1 alpha-2) that get the restricted-mode page.
    pub blocked_regions: Vec<String>,

    /// proxycheck.io API key. When absent the proxy check never blocks.
    pub proxycheck_api_key: Option<String>,

    /// Base URL of the reputation service.
    pub proxycheck_url: String,

    /// VPN detection sensitivity passed to the reputation service (0-3).
    pub vpn_sensitivity: u8,

    /// Optional timeout for reputation lookups. Unset uses the client default.
    pub proxycheck_timeout_secs: Option<u64>,

    /// Route segment of the restricted-mode page.
    pub restricted_mode_segment: String,

    /// Route segment of the VPN-blocked page.
    pub vpn_blocked_segment: String,

    /// Path prefixes (without the leading slash) the gate never evaluates.
    pub excluded_prefixes: Vec<String>,

    /// Header carrying the forwarded client address chain.
    pub client_ip_header: String,

    /// Header carrying the geolocated country code.
    pub country_header: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            blocked_regions: Vec::new(),
            proxycheck_api_key: None,
            proxycheck_url: "https://proxycheck.io".to_string(),
            vpn_sensitivity: 2,
            proxycheck_timeout_secs: None,
            restricted_mode_segment: "restricted-mode".to_string(),
            vpn_blocked_segment: "vpn-blocked".to_string(),
            excluded_prefixes: vec![
                "_next/static".to_string(),
                "_next/image".to_string(),
                "api/".to_string(),
                "terms-of-service".to_string(),
            ],
            client_ip_header: "x-forwarded-for".to_string(),
            country_header: "x-vercel-ip-country".to_string(),
        }
    }
}

/// Dashboard data configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Base URL of the dashboard data upstream.
    pub upstream_url: String,

    /// Background refresh period per cached account, in seconds.
    pub refresh_interval_secs: u64,

    /// Refresh stops for an account not read for this long, in seconds.
    pub idle_timeout_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            upstream_url: "http://127.0.0.1:3000".to_string(),
            refresh_interval_secs: 60,
            idle_timeout_secs: 300,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.gate.vpn_sensitivity, 2);
        assert_eq!(config.gate.vpn_blocked_segment, "vpn-blocked");
        assert_eq!(config.dashboard.refresh_interval_secs, 60);
        assert!(config.gate.proxycheck_api_key.is_none());
    }

    #[test]
    fn test_partial_gate_section() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [gate]
            blocked_regions = ["kp", "ir"]
            proxycheck_api_key = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.gate.blocked_regions, vec!["kp", "ir"]);
        assert_eq!(config.gate.proxycheck_api_key.as_deref(), Some("secret"));
        assert_eq!(config.gate.restricted_mode_segment, "restricted-mode");
        assert_eq!(config.gate.excluded_prefixes.len(), 4);
    }
}
