//! Gate outcomes and the route segments they resolve to.

/// Path of the page served when a blocked segment is requested directly.
pub const NOT_FOUND_PATH: &str = "/not-found";

/// Where a gated request is rewritten to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RewriteTarget {
    VpnBlocked,
    RestrictedMode,
    NotFound,
}

impl RewriteTarget {
    /// Label used in logs, metrics and the rewrite response header.
    pub fn as_str(&self) -> &'static str {
        match self {
            RewriteTarget::VpnBlocked => "vpn_blocked",
            RewriteTarget::RestrictedMode => "restricted_mode",
            RewriteTarget::NotFound => "not_found",
        }
    }
}

/// Result of evaluating one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDecision {
    NoAction,
    RewriteTo(RewriteTarget),
}

impl RequestDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestDecision::NoAction => "pass",
            RequestDecision::RewriteTo(target) => target.as_str(),
        }
    }
}

/// The two configurable page segments the gate rewrites to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSegments {
    restricted_mode_path: String,
    vpn_blocked_path: String,
}

impl RouteSegments {
    /// Build from bare segments, e.g. `"restricted-mode"`.
    pub fn new(restricted_mode_segment: &str, vpn_blocked_segment: &str) -> Self {
        Self {
            restricted_mode_path: format!("/{}", restricted_mode_segment.trim_matches('/')),
            vpn_blocked_path: format!("/{}", vpn_blocked_segment.trim_matches('/')),
        }
    }

    pub fn restricted_mode_path(&self) -> &str {
        &self.restricted_mode_path
    }

    pub fn vpn_blocked_path(&self) -> &str {
        &self.vpn_blocked_path
    }

    pub fn path_for(&self, target: RewriteTarget) -> &str {
        match target {
            RewriteTarget::VpnBlocked => &self.vpn_blocked_path,
            RewriteTarget::RestrictedMode => &self.restricted_mode_path,
            RewriteTarget::NotFound => NOT_FOUND_PATH,
        }
    }

    /// True if `path` already starts with one of the blocked-page paths.
    pub fn is_blocked_segment(&self, path: &str) -> bool {
        path.starts_with(&self.vpn_blocked_path) || path.starts_with(&self.restricted_mode_path)
    }
}

impl Default for RouteSegments {
    fn default() -> Self {
        Self::new("restricted-mode", "vpn-blocked")
    }
}
