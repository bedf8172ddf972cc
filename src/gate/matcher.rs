//! Path matching for the gate middleware.
//!
//! # Design Decisions
//! - Mirrors the edge matcher `/((?!<excluded>|.*\.).*)`: a path is gated
//!   unless the part after the leading `/` starts with an excluded prefix or
//!   contains a `.` anywhere (static assets)
//! - Prefix matching only, no regex in the hot path
//! - Path matching is case-sensitive

/// Decides which request paths the gate evaluates.
#[derive(Debug, Clone)]
pub struct GateMatcher {
    excluded_prefixes: Vec<String>,
}

impl GateMatcher {
    pub fn new<I, S>(excluded_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded_prefixes: excluded_prefixes
                .into_iter()
                .map(|p| p.into().trim_start_matches('/').to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Returns true if the gate should run for `path`.
    pub fn matches(&self, path: &str) -> bool {
        let Some(rest) = path.strip_prefix('/') else {
            return false;
        };
        if rest.contains('.') {
            return false;
        }
        !self
            .excluded_prefixes
            .iter()
            .any(|prefix| rest.starts_with(prefix.as_str()))
    }
}

impl Default for GateMatcher {
    fn default() -> Self {
        Self::new(["_next/static", "_next/image", "api/", "terms-of-service"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_are_gated() {
        let matcher = GateMatcher::default();
        assert!(matcher.matches("/"));
        assert!(matcher.matches("/dashboard"));
        assert!(matcher.matches("/vpn-blocked/foo"));
        // "api" without the trailing slash is a page.
        assert!(matcher.matches("/api"));
    }

    #[test]
    fn test_excluded_paths() {
        let matcher = GateMatcher::default();
        assert!(!matcher.matches("/_next/static/chunks/main"));
        assert!(!matcher.matches("/_next/image"));
        assert!(!matcher.matches("/api/dashboard/abc"));
        assert!(!matcher.matches("/terms-of-service"));
        assert!(!matcher.matches("/terms-of-service/privacy"));
    }

    #[test]
    fn test_dotted_paths_are_assets() {
        let matcher = GateMatcher::default();
        assert!(!matcher.matches("/favicon.ico"));
        assert!(!matcher.matches("/images/logo.svg"));
        assert!(!matcher.matches("/v1.2/page"));
    }

    #[test]
    fn test_custom_prefixes_normalised() {
        let matcher = GateMatcher::new(["/health", ""]);
        assert!(!matcher.matches("/healthz"));
        assert!(matcher.matches("/dashboard"));
    }
}
