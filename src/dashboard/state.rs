//! Dashboard load state machine.
//!
//! Turns a [`FetchSnapshot`] into exactly one [`LoadState`]. The derivation is
//! a pure function of the snapshot; all mutable state lives in the cache.
//!
//! Precedence, first match wins:
//! ```text
//! error present   → Errored(wrap(error), reset)
//! is_loading      → Loading
//! data present    → Loaded(data)
//! otherwise       → NotLoaded
//! ```

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::dashboard::cache::{CacheError, FetchSnapshot};
use crate::dashboard::loader::LoaderError;

/// Invalidation hook behind [`ResetAction`]. Receives the replacement payload,
/// which a reset always leaves empty.
pub type Invalidate<T> =
    Arc<dyn Fn(Option<T>) -> BoxFuture<'static, Result<(), CacheError>> + Send + Sync>;

/// Failure to load the dashboard.
///
/// Carries the cause's message when the cause is a structured error, and an
/// empty message otherwise. The cause is always kept as the error source.
#[derive(Debug, Clone)]
pub struct LoadDashboardDataError {
    message: String,
    cause: Arc<LoaderError>,
}

impl LoadDashboardDataError {
    pub fn new(cause: Arc<LoaderError>) -> Self {
        Self {
            message: cause.structured_message().unwrap_or_default(),
            cause,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> &LoaderError {
        &self.cause
    }
}

impl fmt::Display for LoadDashboardDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for LoadDashboardDataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// Clears the cached result so the dashboard can be loaded again.
pub struct ResetAction<T> {
    key: String,
    invalidate: Invalidate<T>,
}

impl<T> Clone for ResetAction<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            invalidate: self.invalidate.clone(),
        }
    }
}

impl<T> fmt::Debug for ResetAction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetAction").field("key", &self.key).finish()
    }
}

impl<T> ResetAction<T> {
    pub fn new(key: impl Into<String>, invalidate: Invalidate<T>) -> Self {
        Self {
            key: key.into(),
            invalidate,
        }
    }

    /// Invoke the invalidation once with an empty payload.
    ///
    /// Never fails: an invalidation error is logged and dropped.
    pub async fn reset(&self) {
        if let Err(e) = (self.invalidate)(None).await {
            tracing::debug!(key = %self.key, error = %e, "Ignoring failed dashboard reset");
        }
    }
}

/// Discriminated view of the dashboard load.
#[derive(Debug, Clone)]
pub enum LoadState<T> {
    NotLoaded,
    Loading,
    Loaded {
        data: T,
    },
    Errored {
        error: LoadDashboardDataError,
        reset: ResetAction<T>,
    },
}

impl<T> LoadState<T> {
    /// Stable lowercase name of the active variant.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadState::NotLoaded => "not_loaded",
            LoadState::Loading => "loading",
            LoadState::Loaded { .. } => "loaded",
            LoadState::Errored { .. } => "error",
        }
    }
}

/// Derive the load state for a snapshot.
pub fn derive_state<T>(snapshot: FetchSnapshot<T, LoaderError>, reset: ResetAction<T>) -> LoadState<T> {
    let FetchSnapshot {
        data,
        is_loading,
        error,
    } = snapshot;

    if let Some(error) = error {
        LoadState::Errored {
            error: LoadDashboardDataError::new(error),
            reset,
        }
    } else if is_loading {
        LoadState::Loading
    } else if let Some(data) = data {
        LoadState::Loaded { data }
    } else {
        LoadState::NotLoaded
    }
}
