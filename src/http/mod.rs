//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request ID, tracing, timeout)
//!     → middleware.rs (gate: pass or rewrite the URI)
//!     → routing
//!         ├─ pages.rs (publishers, vpn-blocked, restricted-mode, not-found)
//!         └─ handlers.rs (dashboard state and reset, health)
//! ```

pub mod handlers;
pub mod middleware;
pub mod pages;
pub mod server;

pub use middleware::X_GATEWAY_REWRITE;
pub use server::{build_router, AppState, HttpServer, ServerError};
