//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, sensitivity 0-3)
//! - Check route segments are usable as single path segments
//! - Check addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    let gate = &config.gate;
    for (field, segment) in [
        ("gate.restricted_mode_segment", &gate.restricted_mode_segment),
        ("gate.vpn_blocked_segment", &gate.vpn_blocked_segment),
    ] {
        if segment.is_empty() {
            errors.push(ValidationError::new(field, "must not be empty"));
        } else if segment.contains('/') {
            errors.push(ValidationError::new(field, "must be a single path segment"));
        }
    }
    if gate.restricted_mode_segment == gate.vpn_blocked_segment {
        errors.push(ValidationError::new(
            "gate.vpn_blocked_segment",
            "must differ from gate.restricted_mode_segment",
        ));
    }

    if gate.vpn_sensitivity > 3 {
        errors.push(ValidationError::new("gate.vpn_sensitivity", "must be between 0 and 3"));
    }

    for region in &gate.blocked_regions {
        if region.len() != 2 || !region.chars().all(|c| c.is_ascii_alphabetic()) {
            errors.push(ValidationError::new(
                "gate.blocked_regions",
                format!("'{}' is not a two-letter region code", region),
            ));
        }
    }

    if url::Url::parse(&gate.proxycheck_url).is_err() {
        errors.push(ValidationError::new("gate.proxycheck_url", "is not a valid URL"));
    }

    if gate.proxycheck_timeout_secs == Some(0) {
        errors.push(ValidationError::new(
            "gate.proxycheck_timeout_secs",
            "must be greater than 0 when set",
        ));
    }

    for (field, header) in [
        ("gate.client_ip_header", &gate.client_ip_header),
        ("gate.country_header", &gate.country_header),
    ] {
        if axum::http::HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ValidationError::new(field, format!("'{}' is not a header name", header)));
        }
    }

    if url::Url::parse(&config.dashboard.upstream_url).is_err() {
        errors.push(ValidationError::new("dashboard.upstream_url", "is not a valid URL"));
    }
    if config.dashboard.refresh_interval_secs == 0 {
        errors.push(ValidationError::new(
            "dashboard.refresh_interval_secs",
            "must be greater than 0",
        ));
    }
    if config.dashboard.idle_timeout_secs < config.dashboard.refresh_interval_secs {
        errors.push(ValidationError::new(
            "dashboard.idle_timeout_secs",
            "must be at least dashboard.refresh_interval_secs",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
