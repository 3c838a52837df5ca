//! Admin API over guard state.
//!
//! Mounted outside the guard middleware and protected by a bearer key.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::config::AdminConfig;
use crate::security::{EdgeGuard, GuardStore};

pub fn setup_admin_router<S: GuardStore>(guard: Arc<EdgeGuard<S>>, config: &AdminConfig) -> Router {
    let prefix = config.path_prefix.trim_end_matches('/');
    let api_key: Arc<str> = Arc::from(config.api_key.as_str());

    Router::new()
        .route(&format!("{prefix}/status"), get(get_status::<S>))
        .route(
            &format!("{prefix}/clients/{{id}}"),
            get(get_client::<S>).delete(delete_client::<S>),
        )
        .route(&format!("{prefix}/sweep"), post(post_sweep::<S>))
        .layer(middleware::from_fn_with_state(api_key, admin_auth_middleware))
        .with_state(guard)
}
