//! Stale-while-revalidate cache.
//!
//! # Responsibilities
//! - Get-or-fetch per key with in-flight deduplication
//! - Timer-driven background refresh of subscribed keys
//! - Manual invalidation (`mutate`)
//! - Eviction of keys that went idle
//!
//! # Design Decisions
//! - One `Entry` per key behind a `DashMap`; slot state behind a std `Mutex`
//!   that is never held across an `.await`
//! - A fetch is a `Shared` future: late callers join the fetch in flight
//! - Every fetch is driven to completion by a spawned task, so results land in
//!   the cache even if all callers stop waiting
//! - A generation counter lets `mutate` discard results of fetches it raced
//! - Failures keep the last good data next to the error

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior};

use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;

/// Produces a fresh value for one key.
pub type Fetcher<T, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// A fetch in flight. Cloning joins it.
pub type PendingFetch<T, E> = Shared<BoxFuture<'static, Result<T, Arc<E>>>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("no cache entry for key '{0}'")]
    UnknownKey(String),
}

#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    /// Period of the background refresh.
    pub refresh_interval: Duration,
    /// A key's refresh stops after this long without a subscribe.
    pub idle_timeout: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

/// Point-in-time view of one key.
#[derive(Debug)]
pub struct FetchSnapshot<T, E> {
    pub data: Option<T>,
    /// A fetch is in flight and no data has been loaded yet.
    pub is_loading: bool,
    pub error: Option<Arc<E>>,
}

struct Slot<T, E> {
    data: Option<T>,
    error: Option<Arc<E>>,
    in_flight: Option<PendingFetch<T, E>>,
    refreshed_at: Option<Instant>,
    accessed_at: Instant,
    generation: u64,
    refreshing: bool,
    /// Removed from the map; subscribers must insert a fresh entry.
    evicted: bool,
}

struct Entry<T, E> {
    key: String,
    fetcher: Fetcher<T, E>,
    slot: Mutex<Slot<T, E>>,
}

impl<T, E> Entry<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: std::fmt::Display + Send + Sync + 'static,
{
    fn new(key: &str, fetcher: Fetcher<T, E>) -> Self {
        Self {
            key: key.to_string(),
            fetcher,
            slot: Mutex::new(Slot {
                data: None,
                error: None,
                in_flight: None,
                refreshed_at: None,
                accessed_at: Instant::now(),
                generation: 0,
                refreshing: false,
                evicted: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T, E>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Join the fetch in flight, or start one.
    fn revalidate(self: &Arc<Self>) -> PendingFetch<T, E> {
        let mut slot = self.lock();
        if let Some(in_flight) = &slot.in_flight {
            return in_flight.clone();
        }

        let generation = slot.generation;
        let fetch = (self.fetcher)();
        let entry = Arc::downgrade(self);
        let pending = async move {
            let started = Instant::now();
            let result = fetch.await.map_err(Arc::new);
            let outcome = if result.is_ok() { "success" } else { "error" };
            metrics::record_dashboard_fetch(outcome, started.elapsed());
            if let Some(entry) = entry.upgrade() {
                entry.settle(generation, &result);
            }
            result
        }
        .boxed()
        .shared();

        slot.in_flight = Some(pending.clone());
        drop(slot);

        tracing::debug!(key = %self.key, "Fetch started");
        tokio::spawn(pending.clone().map(|_| ()));
        pending
    }

    fn settle(&self, generation: u64, result: &Result<T, Arc<E>>) {
        let mut slot = self.lock();
        if slot.generation != generation {
            tracing::debug!(key = %self.key, "Discarding result of a superseded fetch");
            return;
        }

        slot.in_flight = None;
        slot.refreshed_at = Some(Instant::now());
        match result {
            Ok(data) => {
                slot.data = Some(data.clone());
                slot.error = None;
            }
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Fetch failed");
                slot.error = Some(e.clone());
            }
        }
    }

    /// Mark the entry evicted if the key has gone idle.
    fn stop_if_idle(&self, idle_timeout: Duration) -> bool {
        let mut slot = self.lock();
        if slot.accessed_at.elapsed() >= idle_timeout {
            slot.refreshing = false;
            slot.evicted = true;
            true
        } else {
            false
        }
    }
}

/// A keyed stale-while-revalidate cache.
pub struct SwrCache<T, E> {
    entries: Arc<DashMap<String, Arc<Entry<T, E>>>>,
    options: CacheOptions,
    shutdown: ShutdownSignal,
}

impl<T, E> SwrCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: std::fmt::Display + Send + Sync + 'static,
{
    pub fn new(options: CacheOptions, shutdown: ShutdownSignal) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            options,
            shutdown,
        }
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register interest in `key`.
    ///
    /// The first subscribe stores `fetcher` for the key. A fetch starts when
    /// the key has never loaded, was reset, or went stale while idle. The
    /// background refresh is (re)started if it is not running. Returns the
    /// fetch in flight, if any.
    pub fn subscribe(&self, key: &str, fetcher: Fetcher<T, E>) -> Option<PendingFetch<T, E>> {
        self.subscribe_entry(key, fetcher).1
    }

    fn subscribe_entry(
        &self,
        key: &str,
        fetcher: Fetcher<T, E>,
    ) -> (Arc<Entry<T, E>>, Option<PendingFetch<T, E>>) {
        let (entry, needs_fetch, start_refresher, in_flight) = loop {
            let entry = self
                .entries
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Entry::new(key, fetcher.clone())))
                .value()
                .clone();

            let outcome = {
                let mut slot = entry.lock();
                if slot.evicted {
                    None
                } else {
                    slot.accessed_at = Instant::now();
                    let stale = slot
                        .refreshed_at
                        .map_or(true, |at| at.elapsed() >= self.options.refresh_interval);
                    let needs_fetch = slot.in_flight.is_none() && stale;
                    let start_refresher = !slot.refreshing;
                    slot.refreshing = true;
                    Some((needs_fetch, start_refresher, slot.in_flight.clone()))
                }
            };

            match outcome {
                Some((needs_fetch, start_refresher, in_flight)) => {
                    break (entry, needs_fetch, start_refresher, in_flight)
                }
                // Lost a race with the idle eviction of this entry.
                None => {
                    self.entries.remove_if(key, |_, e| Arc::ptr_eq(e, &entry));
                }
            }
        };
        metrics::record_cache_size(self.entries.len());

        if start_refresher {
            self.spawn_refresher(entry.clone());
        }
        let pending = if needs_fetch {
            Some(entry.revalidate())
        } else {
            in_flight
        };
        (entry, pending)
    }

    /// Subscribe, then wait for a value.
    ///
    /// Fresh cached data is returned without fetching.
    pub async fn get_or_fetch(&self, key: &str, fetcher: Fetcher<T, E>) -> Result<T, Arc<E>> {
        let (entry, pending) = self.subscribe_entry(key, fetcher);
        if let Some(pending) = pending {
            return pending.await;
        }

        let pending = {
            let slot = entry.lock();
            if let Some(data) = &slot.data {
                return Ok(data.clone());
            }
            if let Some(error) = &slot.error {
                return Err(error.clone());
            }
            slot.in_flight.clone()
        };
        match pending {
            Some(pending) => pending.await,
            None => entry.revalidate().await,
        }
    }

    /// Start a fetch for `key` unless one is in flight.
    pub fn revalidate(&self, key: &str) -> Result<PendingFetch<T, E>, CacheError> {
        self.entry(key)
            .map(|entry| entry.revalidate())
            .ok_or_else(|| CacheError::UnknownKey(key.to_string()))
    }

    /// Read the current state of `key` without side effects.
    pub fn snapshot(&self, key: &str) -> Option<FetchSnapshot<T, E>> {
        let entry = self.entry(key)?;
        let slot = entry.lock();
        Some(FetchSnapshot {
            data: slot.data.clone(),
            is_loading: slot.in_flight.is_some() && slot.data.is_none(),
            error: slot.error.clone(),
        })
    }

    /// Overwrite the cached value of `key`; `None` clears it.
    ///
    /// Clears any error and drops the fetch in flight. Clearing marks the key
    /// as never loaded, so the next subscribe fetches again.
    pub fn mutate(&self, key: &str, data: Option<T>) -> Result<(), CacheError> {
        let entry = self
            .entry(key)
            .ok_or_else(|| CacheError::UnknownKey(key.to_string()))?;

        let mut slot = entry.lock();
        slot.generation += 1;
        slot.in_flight = None;
        slot.error = None;
        slot.refreshed_at = data.as_ref().map(|_| Instant::now());
        slot.data = data;

        tracing::debug!(key = %key, cleared = slot.data.is_none(), "Cache entry mutated");
        Ok(())
    }

    fn entry(&self, key: &str) -> Option<Arc<Entry<T, E>>> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    fn spawn_refresher(&self, entry: Arc<Entry<T, E>>) {
        let options = self.options;
        let entries = self.entries.clone();
        let mut shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(options.refresh_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if entry.stop_if_idle(options.idle_timeout) {
                            entries.remove_if(&entry.key, |_, e| Arc::ptr_eq(e, &entry));
                            metrics::record_cache_size(entries.len());
                            tracing::debug!(key = %entry.key, "Idle key evicted");
                            break;
                        }
                        let _ = entry.revalidate();
                    }
                    _ = shutdown.recv() => {
                        entry.lock().refreshing = false;
                        break;
                    }
                }
            }
        });
    }
}
