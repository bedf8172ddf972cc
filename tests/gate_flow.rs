mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::json;
use tower::ServiceExt;

use staking_gateway::config::{GateConfig, GatewayConfig};
use staking_gateway::dashboard::{
    ApiContext, CacheOptions, DashboardData, DashboardLoader, DashboardService, LoaderError,
};
use staking_gateway::gate::{CheckOptions, ProxyCheckClient, ProxyChecker, RequestGate};
use staking_gateway::http::{HttpServer, X_GATEWAY_REWRITE};
use staking_gateway::lifecycle::Shutdown;

struct StaticLoader;

#[async_trait]
impl DashboardLoader for StaticLoader {
    async fn load_data(&self, _ctx: &ApiContext) -> Result<DashboardData, LoaderError> {
        Ok(DashboardData(json!({"pools": []})))
    }
}

fn gateway(gate_config: GateConfig) -> (Router, Shutdown) {
    let shutdown = Shutdown::new();
    let config = GatewayConfig {
        gate: gate_config,
        ..GatewayConfig::default()
    };
    let gate = Arc::new(RequestGate::from_config(&config.gate).unwrap());
    let dashboard = Arc::new(DashboardService::new(
        Arc::new(StaticLoader),
        CacheOptions::default(),
        shutdown.subscribe(),
    ));
    let server = HttpServer::with_components(config, gate, dashboard);
    (server.router(), shutdown)
}

fn denylist_config() -> GateConfig {
    GateConfig {
        blocked_regions: vec!["kp".into(), "ir".into()],
        ..GateConfig::default()
    }
}

async fn send(app: &Router, path: &str, ip: &str, country: Option<&str>) -> Response {
    let mut builder = Request::builder().uri(path).header("x-forwarded-for", ip);
    if let Some(country) = country {
        builder = builder.header("x-vercel-ip-country", country);
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn rewrite_header(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(X_GATEWAY_REWRITE)
        .and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn test_blocked_region_sees_restricted_page() {
    let (app, _shutdown) = gateway(denylist_config());

    let response = send(&app, "/staking?tab=pools", "203.0.113.7", Some("KP")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(rewrite_header(&response), Some("restricted_mode"));
    assert!(body_text(response).await.contains("<title>Restricted Mode</title>"));
}

#[tokio::test]
async fn test_allowed_request_reaches_page() {
    let (app, _shutdown) = gateway(denylist_config());

    let response = send(&app, "/publishers", "203.0.113.7", Some("US")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(rewrite_header(&response), None);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "public, s-maxage=3600"
    );
    assert!(response.headers().contains_key("x-request-id"));
    assert!(body_text(response).await.contains("<title>Publishers</title>"));
}

#[tokio::test]
async fn test_direct_visit_to_blocked_page_is_not_found() {
    let (app, _shutdown) = gateway(denylist_config());

    for path in ["/vpn-blocked", "/restricted-mode/extra"] {
        let response = send(&app, path, "203.0.113.7", Some("US")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(rewrite_header(&response), Some("not_found"));
    }
}

#[tokio::test]
async fn test_excluded_paths_skip_the_gate() {
    let (app, _shutdown) = gateway(denylist_config());

    let response = send(&app, "/api/health", "203.0.113.7", Some("KP")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(rewrite_header(&response), None);
    assert_eq!(body_text(response).await, "ok");

    let response = send(&app, "/logo.png", "203.0.113.7", Some("KP")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(rewrite_header(&response), None);
}

#[tokio::test]
async fn test_custom_segments() {
    let (app, _shutdown) = gateway(GateConfig {
        restricted_mode_segment: "region-unavailable".into(),
        ..denylist_config()
    });

    let response = send(&app, "/", "203.0.113.7", Some("IR")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(rewrite_header(&response), Some("restricted_mode"));

    let response = send(&app, "/region-unavailable", "203.0.113.7", Some("US")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reputation_client_queries_lookup_api() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let addr = common::start_programmable_backend(move |target| {
        recorder.lock().unwrap().push(target);
        async move {
            (
                200,
                json!({
                    "status": "ok",
                    "198.51.100.9": {"proxy": "yes", "type": "VPN"}
                })
                .to_string(),
            )
        }
    })
    .await;

    let client = ProxyCheckClient::new(&format!("http://{}", addr), "test-key", None).unwrap();
    let result = client
        .check_ip("198.51.100.9", CheckOptions::default())
        .await
        .unwrap();

    assert!(result["198.51.100.9"].is_proxy());
    assert_eq!(result["198.51.100.9"].kind.as_deref(), Some("VPN"));
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        ["/v2/198.51.100.9?key=test-key&vpn=2"]
    );
}

#[tokio::test]
async fn test_flagged_client_sees_vpn_page() {
    let addr = common::start_programmable_backend(|target| async move {
        let proxy = if target.contains("198.51.100.9") { "yes" } else { "no" };
        let ip = target
            .trim_start_matches("/v2/")
            .split('?')
            .next()
            .unwrap_or_default()
            .to_string();
        (200, json!({ "status": "ok", ip: {"proxy": proxy} }).to_string())
    })
    .await;

    let (app, _shutdown) = gateway(GateConfig {
        proxycheck_api_key: Some("test-key".into()),
        proxycheck_url: format!("http://{}", addr),
        ..denylist_config()
    });

    // The reputation check wins over the region check.
    let response = send(&app, "/", "198.51.100.9", Some("KP")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(rewrite_header(&response), Some("vpn_blocked"));
    assert!(body_text(response).await.contains("<title>VPN Blocked</title>"));

    let response = send(&app, "/publishers", "203.0.113.7", Some("US")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(rewrite_header(&response), None);
}

#[tokio::test]
async fn test_reputation_failure_is_server_error() {
    let addr = common::start_programmable_backend(|_| async move {
        (
            200,
            json!({"status": "error", "message": "API key invalid"}).to_string(),
        )
    })
    .await;

    let (app, _shutdown) = gateway(GateConfig {
        proxycheck_api_key: Some("bad-key".into()),
        proxycheck_url: format!("http://{}", addr),
        ..denylist_config()
    });

    let response = send(&app, "/publishers", "203.0.113.7", Some("US")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // Excluded paths never reach the reputation service.
    let response = send(&app, "/api/health", "203.0.113.7", Some("US")).await;
    assert_eq!(response.status(), StatusCode::OK);
}
