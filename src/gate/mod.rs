//! Request gate subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming page request
//!     → matcher.rs (skip assets, api/, excluded prefixes)
//!     → client.rs (client IP, geolocated country)
//!     → RequestGate::evaluate, first match wins:
//!         1. proxy_check.rs (async reputation lookup)  → /vpn-blocked
//!         2. region denylist                           → /restricted-mode
//!         3. already on a blocked segment              → /not-found
//!     → RequestDecision (NoAction | RewriteTo)
//! ```
//!
//! # Design Decisions
//! - The reputation lookup runs first even though it is the only network
//!   call: it is the strongest signal and overrides geography
//! - The checker is injected once and never rebuilt; the region list and
//!   segments sit behind an `ArcSwap` so config reloads can replace them
//! - The gate holds no per-request state

pub mod client;
pub mod decision;
pub mod matcher;
pub mod proxy_check;

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::config::GateConfig;

pub use client::ClientHeaders;
pub use decision::{RequestDecision, RewriteTarget, RouteSegments, NOT_FOUND_PATH};
pub use matcher::GateMatcher;
pub use proxy_check::{
    is_proxy_blocked, CheckOptions, CheckResult, IpRecord, ProxyCheckClient, ProxyCheckError,
    ProxyChecker,
};

/// Request metadata the gate decides on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateRequest {
    pub ip: Option<IpAddr>,
    pub country: Option<String>,
    pub path: String,
}

/// The hot-swappable part of the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatePolicy {
    blocked_regions: HashSet<String>,
    segments: RouteSegments,
}

impl GatePolicy {
    /// Region codes are compared lower-cased.
    pub fn new<I, S>(blocked_regions: I, segments: RouteSegments) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            blocked_regions: blocked_regions
                .into_iter()
                .map(|r| r.as_ref().trim().to_lowercase())
                .collect(),
            segments,
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(
            &config.blocked_regions,
            RouteSegments::new(&config.restricted_mode_segment, &config.vpn_blocked_segment),
        )
    }

    pub fn segments(&self) -> &RouteSegments {
        &self.segments
    }

    pub fn is_region_blocked(&self, country: Option<&str>) -> bool {
        country.is_some_and(|c| self.blocked_regions.contains(&c.to_lowercase()))
    }
}

/// Sequential request filter producing rewrite decisions.
pub struct RequestGate {
    checker: Option<Arc<dyn ProxyChecker>>,
    options: CheckOptions,
    policy: ArcSwap<GatePolicy>,
}

impl RequestGate {
    pub fn new(checker: Option<Arc<dyn ProxyChecker>>, options: CheckOptions, policy: GatePolicy) -> Self {
        Self {
            checker,
            options,
            policy: ArcSwap::from_pointee(policy),
        }
    }

    /// Build the gate, including the reputation client when a key is set.
    pub fn from_config(config: &GateConfig) -> Result<Self, ProxyCheckError> {
        let checker: Option<Arc<dyn ProxyChecker>> = match &config.proxycheck_api_key {
            Some(key) => Some(Arc::new(ProxyCheckClient::new(
                &config.proxycheck_url,
                key.clone(),
                config.proxycheck_timeout_secs.map(Duration::from_secs),
            )?)),
            None => {
                tracing::warn!("No reputation API key configured, proxy/VPN check disabled");
                None
            }
        };

        Ok(Self::new(
            checker,
            CheckOptions {
                vpn: config.vpn_sensitivity,
            },
            GatePolicy::from_config(config),
        ))
    }

    pub fn has_proxy_checker(&self) -> bool {
        self.checker.is_some()
    }

    pub fn policy(&self) -> Arc<GatePolicy> {
        self.policy.load_full()
    }

    /// Replace the region list and segments.
    pub fn update_policy(&self, policy: GatePolicy) {
        self.policy.store(Arc::new(policy));
    }

    /// Decide what to do with one request.
    ///
    /// A failed reputation lookup is returned as an error; the region and
    /// segment checks do not run in that case.
    pub async fn evaluate(&self, request: &GateRequest) -> Result<RequestDecision, ProxyCheckError> {
        if is_proxy_blocked(self.checker.as_deref(), request.ip, self.options).await? {
            return Ok(RequestDecision::RewriteTo(RewriteTarget::VpnBlocked));
        }

        let policy = self.policy.load();
        let decision = if policy.is_region_blocked(request.country.as_deref()) {
            RequestDecision::RewriteTo(RewriteTarget::RestrictedMode)
        } else if policy.segments.is_blocked_segment(&request.path) {
            RequestDecision::RewriteTo(RewriteTarget::NotFound)
        } else {
            RequestDecision::NoAction
        };
        Ok(decision)
    }
}
