//! Dashboard data subsystem.
//!
//! # Data Flow
//! ```text
//! GET /api/dashboard/{address}
//!     → account.rs (parse address, derive cache key)
//!     → service.rs (subscribe key, optionally wait)
//!     → cache.rs (dedup fetch, background refresh, mutate)
//!     → loader.rs (external data source)
//!     → state.rs (snapshot → LoadState)
//! ```

pub mod account;
pub mod cache;
pub mod loader;
pub mod service;
pub mod state;

pub use account::{cache_key, AccountAddress, ApiContext, StakeAccount};
pub use cache::{CacheError, CacheOptions, FetchSnapshot, SwrCache};
pub use loader::{DashboardData, DashboardLoader, HttpDashboardLoader, LoaderError};
pub use service::DashboardService;
pub use state::{derive_state, LoadDashboardDataError, LoadState, ResetAction};
