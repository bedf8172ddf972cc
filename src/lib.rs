//! Staking Gateway Library
//!
//! Edge request gating and cached dashboard data for the staking app.

pub mod config;
pub mod dashboard;
pub mod gate;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
