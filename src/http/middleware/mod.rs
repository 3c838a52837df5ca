//! HTTP middleware.

pub mod guard;

pub use guard::guard_middleware;
