//! Edge request guard for the marketplace back-office.
//!
//! Rate-limits the login endpoint, locks out clients after repeated login
//! failures, enforces a double-submit CSRF token and stamps security headers,
//! then forwards passed requests to the upstream application.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GuardConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use security::{EdgeGuard, GuardError};
