//! Gate middleware.
//! Rewrites gated page requests before routing.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::gate::{ClientHeaders, GateMatcher, GateRequest, RequestDecision, RequestGate};
use crate::observability::metrics;

/// Response header naming the rewrite target of a gated request.
pub const X_GATEWAY_REWRITE: HeaderName = HeaderName::from_static("x-gateway-rewrite");

/// State required by the gate middleware.
#[derive(Clone)]
pub struct GateLayerState {
    pub gate: Arc<RequestGate>,
    pub matcher: GateMatcher,
    pub headers: ClientHeaders,
}

pub async fn gate_middleware(
    State(state): State<GateLayerState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !state.matcher.matches(&path) {
        return next.run(request).await;
    }

    let gate_request = GateRequest {
        ip: state.headers.client_ip(&request),
        country: state.headers.country(&request),
        path,
    };

    let decision = match state.gate.evaluate(&gate_request).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::error!(
                path = %gate_request.path,
                ip = ?gate_request.ip,
                error = %e,
                "Reputation lookup failed"
            );
            metrics::record_gate_decision("error");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        }
    };
    metrics::record_gate_decision(decision.as_str());

    let RequestDecision::RewriteTo(target) = decision else {
        return next.run(request).await;
    };

    let policy = state.gate.policy();
    let target_path = policy.segments().path_for(target);
    let uri = match Uri::try_from(target_path) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(target = %target_path, error = %e, "Invalid rewrite target");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        }
    };

    tracing::info!(
        path = %gate_request.path,
        country = ?gate_request.country,
        rewrite = target.as_str(),
        "Request rewritten"
    );
    *request.uri_mut() = uri;

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(X_GATEWAY_REWRITE, HeaderValue::from_static(target.as_str()));
    response
}
