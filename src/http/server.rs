//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with page and API handlers
//! - Run the gate middleware ahead of routing so rewrites re-route
//! - Wire up middleware (tracing, timeout, request ID)
//! - Apply hot-reloaded gate policy
//! - Serve until shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use url::Url;

use crate::config::{DashboardConfig, GatewayConfig};
use crate::dashboard::{CacheOptions, DashboardService, HttpDashboardLoader};
use crate::gate::{ClientHeaders, GateMatcher, GatePolicy, ProxyCheckError, RequestGate};
use crate::http::handlers;
use crate::http::middleware::{gate_middleware, GateLayerState};
use crate::http::pages;
use crate::lifecycle::ShutdownSignal;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build reputation client: {0}")]
    Gate(#[from] ProxyCheckError),
    #[error("invalid dashboard upstream url: {0}")]
    UpstreamUrl(#[from] url::ParseError),
    #[error("failed to build dashboard client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<RequestGate>,
    pub dashboard: Arc<DashboardService>,
}

/// HTTP server for the staking gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    gate: Arc<RequestGate>,
}

impl HttpServer {
    /// Create a server from configuration.
    ///
    /// Dashboard refresh tasks stop when `shutdown` fires.
    pub fn new(config: GatewayConfig, shutdown: ShutdownSignal) -> Result<Self, ServerError> {
        let gate = Arc::new(RequestGate::from_config(&config.gate)?);

        let upstream = Url::parse(&config.dashboard.upstream_url)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .build()?;
        let loader = Arc::new(HttpDashboardLoader::new(client, upstream));
        let dashboard = Arc::new(DashboardService::new(
            loader,
            cache_options(&config.dashboard),
            shutdown,
        ));

        Ok(Self::with_components(config, gate, dashboard))
    }

    /// Create a server around an existing gate and dashboard service.
    pub fn with_components(
        config: GatewayConfig,
        gate: Arc<RequestGate>,
        dashboard: Arc<DashboardService>,
    ) -> Self {
        let state = AppState {
            gate: gate.clone(),
            dashboard,
        };
        let router = build_router(&config, state);
        Self {
            router,
            config,
            gate,
        }
    }

    /// The fully layered application.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            proxy_check = self.gate.has_proxy_checker(),
            "HTTP server starting"
        );

        let gate = self.gate.clone();
        let mut current = self.config.clone();
        let mut reload_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(new_config) = config_updates.recv() => {
                        apply_reload(&gate, &current, &new_config);
                        current = new_config;
                    }
                    _ = reload_shutdown.recv() => break,
                    else => break,
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let mut shutdown = shutdown;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

pub fn cache_options(config: &DashboardConfig) -> CacheOptions {
    CacheOptions {
        refresh_interval: Duration::from_secs(config.refresh_interval_secs),
        idle_timeout: Duration::from_secs(config.idle_timeout_secs),
    }
}

/// Build the Axum router with all middleware layers.
///
/// The routes sit behind a fallback service of an outer router, so the gate
/// middleware sees each request before the inner router matches it.
#[allow(deprecated)]
pub fn build_router(config: &GatewayConfig, state: AppState) -> Router {
    let gate_state = GateLayerState {
        gate: state.gate.clone(),
        matcher: GateMatcher::new(&config.gate.excluded_prefixes),
        headers: ClientHeaders::new(&config.gate.client_ip_header, &config.gate.country_header),
    };

    let routes = Router::new()
        .route("/publishers", get(pages::publishers))
        .route("/not-found", get(pages::not_found))
        .route("/api/health", get(handlers::health))
        .route("/api/dashboard/{address}", get(handlers::get_dashboard))
        .route("/api/dashboard/{address}/reset", post(handlers::reset_dashboard))
        .fallback(pages::fallback)
        .with_state(state);

    Router::new()
        .fallback_service(routes)
        .layer(middleware::from_fn_with_state(gate_state, gate_middleware))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Settings that are read once at startup.
pub fn restart_required(current: &GatewayConfig, new: &GatewayConfig) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if current.listener.bind_address != new.listener.bind_address {
        fields.push("listener.bind_address");
    }
    if current.timeouts.request_secs != new.timeouts.request_secs {
        fields.push("timeouts.request_secs");
    }
    if current.gate.proxycheck_api_key != new.gate.proxycheck_api_key {
        fields.push("gate.proxycheck_api_key");
    }
    if current.gate.proxycheck_url != new.gate.proxycheck_url {
        fields.push("gate.proxycheck_url");
    }
    if current.gate.vpn_sensitivity != new.gate.vpn_sensitivity {
        fields.push("gate.vpn_sensitivity");
    }
    if current.gate.excluded_prefixes != new.gate.excluded_prefixes {
        fields.push("gate.excluded_prefixes");
    }
    if current.gate.client_ip_header != new.gate.client_ip_header
        || current.gate.country_header != new.gate.country_header
    {
        fields.push("gate headers");
    }
    if current.dashboard != new.dashboard {
        fields.push("dashboard");
    }
    fields
}

fn apply_reload(gate: &RequestGate, current: &GatewayConfig, new: &GatewayConfig) {
    let policy = GatePolicy::from_config(&new.gate);
    if *gate.policy() != policy {
        gate.update_policy(policy);
        tracing::info!(
            blocked_regions = new.gate.blocked_regions.len(),
            "Gate policy reloaded"
        );
    }

    let stale = restart_required(current, new);
    if !stale.is_empty() {
        tracing::warn!(fields = ?stale, "Changed settings take effect after restart");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restart_required_ignores_policy_fields() {
        let current = GatewayConfig::default();
        let mut new = current.clone();
        new.gate.blocked_regions = vec!["kp".into()];
        new.gate.vpn_blocked_segment = "blocked".into();
        assert!(restart_required(&current, &new).is_empty());

        new.gate.proxycheck_api_key = Some("key".into());
        new.dashboard.refresh_interval_secs = 30;
        assert_eq!(
            restart_required(&current, &new),
            vec!["gate.proxycheck_api_key", "dashboard"]
        );
    }

    #[test]
    fn test_apply_reload_swaps_policy() {
        let current = GatewayConfig::default();
        let gate = RequestGate::from_config(&current.gate).unwrap();

        let mut new = current.clone();
        new.gate.blocked_regions = vec!["KP".into()];
        apply_reload(&gate, &current, &new);

        assert!(gate.policy().is_region_blocked(Some("kp")));
    }

    #[test]
    fn test_cache_options_from_config() {
        let options = cache_options(&DashboardConfig {
            refresh_interval_secs: 15,
            idle_timeout_secs: 120,
            ..DashboardConfig::default()
        });
        assert_eq!(options.refresh_interval, Duration::from_secs(15));
        assert_eq!(options.idle_timeout, Duration::from_secs(120));
    }
}
