//! Dashboard data service.
//!
//! Binds the loader, the cache and the state machine together: one call per
//! read yields the current [`LoadState`] for an account.

use std::sync::Arc;

use futures_util::FutureExt;

use crate::dashboard::account::{cache_key, ApiContext};
use crate::dashboard::cache::{CacheOptions, Fetcher, SwrCache};
use crate::dashboard::loader::{DashboardData, DashboardLoader, LoaderError};
use crate::dashboard::state::{derive_state, Invalidate, LoadState, ResetAction};
use crate::lifecycle::ShutdownSignal;

pub type DashboardCache = SwrCache<DashboardData, LoaderError>;

pub struct DashboardService {
    cache: Arc<DashboardCache>,
    loader: Arc<dyn DashboardLoader>,
}

impl DashboardService {
    pub fn new(loader: Arc<dyn DashboardLoader>, options: CacheOptions, shutdown: ShutdownSignal) -> Self {
        Self {
            cache: Arc::new(SwrCache::new(options, shutdown)),
            loader,
        }
    }

    pub fn cache(&self) -> &Arc<DashboardCache> {
        &self.cache
    }

    /// Current load state of the dashboard for `ctx`.
    ///
    /// Subscribes the account's cache key, starting a fetch if needed. With
    /// `wait` set, a fetch in flight is awaited before the state is derived.
    pub async fn dashboard_state(&self, ctx: &ApiContext, wait: bool) -> LoadState<DashboardData> {
        let key = cache_key(ctx);
        if wait {
            // The outcome is read back from the snapshot below.
            let _ = self.cache.get_or_fetch(&key, self.fetcher(ctx)).await;
        } else {
            self.cache.subscribe(&key, self.fetcher(ctx));
        }
        self.derive(&key)
    }

    /// Load state of the dashboard for `ctx` without subscribing.
    ///
    /// Never starts a fetch; an account nobody read is `NotLoaded`.
    pub fn current_state(&self, ctx: &ApiContext) -> LoadState<DashboardData> {
        self.derive(&cache_key(ctx))
    }

    fn derive(&self, key: &str) -> LoadState<DashboardData> {
        match self.cache.snapshot(key) {
            Some(mut snapshot) => {
                snapshot.data = snapshot.data.filter(DashboardData::is_present);
                derive_state(snapshot, self.reset_action(key))
            }
            None => LoadState::NotLoaded,
        }
    }

    fn fetcher(&self, ctx: &ApiContext) -> Fetcher<DashboardData, LoaderError> {
        let loader = self.loader.clone();
        let ctx = ctx.clone();
        Arc::new(move || {
            let loader = loader.clone();
            let ctx = ctx.clone();
            async move { loader.load_data(&ctx).await }.boxed()
        })
    }

    fn reset_action(&self, key: &str) -> ResetAction<DashboardData> {
        let cache = self.cache.clone();
        let cache_key = key.to_string();
        let invalidate: Invalidate<DashboardData> = Arc::new(move |data: Option<DashboardData>| {
            let result = cache.mutate(&cache_key, data);
            async move { result }.boxed()
        });
        ResetAction::new(key, invalidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::account::AccountAddress;
    use crate::lifecycle::Shutdown;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails on the first call, succeeds afterwards.
    struct FlakyLoader {
        calls: AtomicU32,
    }

    #[async_trait]
    impl DashboardLoader for FlakyLoader {
        async fn load_data(&self, ctx: &ApiContext) -> Result<DashboardData, LoaderError> {
            match self.calls.fetch_add(1, Ordering::SeqCst) {
                0 => Err(LoaderError::Upstream("rpc unavailable".into())),
                n => Ok(DashboardData(json!({
                    "account": ctx.stake_account.address.to_string(),
                    "load": n,
                }))),
            }
        }
    }

    #[tokio::test]
    async fn test_error_then_reset_then_loaded() {
        let shutdown = Shutdown::new();
        let loader = Arc::new(FlakyLoader {
            calls: AtomicU32::new(0),
        });
        let service = DashboardService::new(loader.clone(), CacheOptions::default(), shutdown.subscribe());
        let ctx = ApiContext::for_address(AccountAddress::new([9u8; 32]));

        let reset = match service.dashboard_state(&ctx, true).await {
            LoadState::Errored { error, reset } => {
                assert_eq!(error.message(), "rpc unavailable");
                reset
            }
            other => panic!("expected Errored, got {}", other.kind()),
        };

        reset.reset().await;
        assert!(matches!(
            service.cache().snapshot(&cache_key(&ctx)).map(|s| s.error.is_none() && s.data.is_none()),
            Some(true)
        ));

        match service.dashboard_state(&ctx, true).await {
            LoadState::Loaded { data } => assert_eq!(data.0["load"], 1),
            other => panic!("expected Loaded, got {}", other.kind()),
        }
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
        shutdown.trigger();
    }

    #[tokio::test]
    async fn test_without_wait_reports_loading() {
        let shutdown = Shutdown::new();
        let loader = Arc::new(FlakyLoader {
            calls: AtomicU32::new(1),
        });
        let service = DashboardService::new(loader, CacheOptions::default(), shutdown.subscribe());
        let ctx = ApiContext::for_address(AccountAddress::new([3u8; 32]));

        assert!(matches!(service.dashboard_state(&ctx, false).await, LoadState::Loading));
        assert!(matches!(
            service.dashboard_state(&ctx, true).await,
            LoadState::Loaded { .. }
        ));
        shutdown.trigger();
    }

    /// Answers every load with an empty payload.
    struct EmptyLoader {
        calls: AtomicU32,
    }

    #[async_trait]
    impl DashboardLoader for EmptyLoader {
        async fn load_data(&self, _ctx: &ApiContext) -> Result<DashboardData, LoaderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(DashboardData(serde_json::Value::Null))
        }
    }

    #[tokio::test]
    async fn test_empty_payload_is_not_loaded() {
        let shutdown = Shutdown::new();
        let loader = Arc::new(EmptyLoader {
            calls: AtomicU32::new(0),
        });
        let service = DashboardService::new(loader.clone(), CacheOptions::default(), shutdown.subscribe());
        let ctx = ApiContext::for_address(AccountAddress::new([4u8; 32]));

        assert!(matches!(service.dashboard_state(&ctx, true).await, LoadState::NotLoaded));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        shutdown.trigger();
    }

    #[tokio::test]
    async fn test_current_state_never_fetches() {
        let shutdown = Shutdown::new();
        let loader = Arc::new(FlakyLoader {
            calls: AtomicU32::new(0),
        });
        let service = DashboardService::new(loader.clone(), CacheOptions::default(), shutdown.subscribe());
        let ctx = ApiContext::for_address(AccountAddress::new([5u8; 32]));

        assert!(matches!(service.current_state(&ctx), LoadState::NotLoaded));
        assert!(service.cache().is_empty());
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);

        assert!(matches!(service.dashboard_state(&ctx, true).await, LoadState::Errored { .. }));
        assert!(matches!(service.current_state(&ctx), LoadState::Errored { .. }));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        shutdown.trigger();
    }
}
