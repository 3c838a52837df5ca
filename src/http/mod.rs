//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (assign request ID)
//!     → middleware/guard.rs (edge guard: reject or pass)
//!     → server.rs proxy_handler (forward to upstream)
//!     → guard cookies + security headers on the way out
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::HttpServer;
