//! Static page shells.
//!
//! The page content itself is rendered client-side; the gateway serves the
//! document with its title and caching metadata.

use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};

use crate::http::server::AppState;

/// Document metadata of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: &'static str,
    /// Shared caches may serve the page for this long.
    pub revalidate: Option<Duration>,
}

pub const PUBLISHERS: PageMetadata = PageMetadata {
    title: "Publishers",
    revalidate: Some(Duration::from_secs(3600)),
};

pub const VPN_BLOCKED: PageMetadata = PageMetadata {
    title: "VPN Blocked",
    revalidate: None,
};

pub const RESTRICTED_MODE: PageMetadata = PageMetadata {
    title: "Restricted Mode",
    revalidate: None,
};

pub const NOT_FOUND: PageMetadata = PageMetadata {
    title: "Not Found",
    revalidate: None,
};

fn render(page: PageMetadata, status: StatusCode, id: &str) -> Response {
    let body = format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title></head>\
         <body><main id=\"{}\"></main></body></html>",
        page.title, id
    );

    let mut response = (status, Html(body)).into_response();
    let cache_control = match page.revalidate {
        Some(ttl) => format!("public, s-maxage={}", ttl.as_secs()),
        None => "no-store".to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&cache_control) {
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }
    response
}

pub async fn publishers() -> Response {
    render(PUBLISHERS, StatusCode::OK, "publishers")
}

pub async fn not_found() -> Response {
    render(NOT_FOUND, StatusCode::NOT_FOUND, "not-found")
}

/// Serves the blocked pages under their configured segments, 404 otherwise.
pub async fn fallback(State(state): State<AppState>, uri: Uri) -> Response {
    let policy = state.gate.policy();
    let segments = policy.segments();
    let path = uri.path().trim_end_matches('/');

    if path == segments.vpn_blocked_path() {
        render(VPN_BLOCKED, StatusCode::OK, "vpn-blocked")
    } else if path == segments.restricted_mode_path() {
        render(RESTRICTED_MODE, StatusCode::OK, "restricted-mode")
    } else {
        not_found().await
    }
}
