//! Client metadata extraction.
//!
//! The edge in front of the gateway forwards the client address and the
//! geolocated country as headers. The socket peer is the fallback address.

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, HeaderName, Request};

/// Header names the gate reads client metadata from.
#[derive(Debug, Clone)]
pub struct ClientHeaders {
    ip: HeaderName,
    country: HeaderName,
}

impl ClientHeaders {
    /// Invalid names fall back to the defaults.
    pub fn new(ip_header: &str, country_header: &str) -> Self {
        let defaults = Self::default();
        Self {
            ip: HeaderName::from_bytes(ip_header.as_bytes()).unwrap_or(defaults.ip),
            country: HeaderName::from_bytes(country_header.as_bytes()).unwrap_or(defaults.country),
        }
    }

    /// First address of the forwarded chain, else the socket peer.
    pub fn client_ip<B>(&self, request: &Request<B>) -> Option<IpAddr> {
        forwarded_ip(request.headers(), &self.ip).or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
    }

    pub fn country<B>(&self, request: &Request<B>) -> Option<String> {
        request
            .headers()
            .get(&self.country)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    }
}

impl Default for ClientHeaders {
    fn default() -> Self {
        Self {
            ip: HeaderName::from_static("x-forwarded-for"),
            country: HeaderName::from_static("x-vercel-ip-country"),
        }
    }
}

fn forwarded_ip(headers: &HeaderMap, name: &HeaderName) -> Option<IpAddr> {
    let value = headers.get(name)?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    first
        .parse::<IpAddr>()
        .ok()
        .or_else(|| first.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}
