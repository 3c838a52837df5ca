//! Guard middleware.
//!
//! Runs the edge guard in front of every guarded route. Rejections are
//! returned immediately; passed requests continue to the handler and get
//! the verdict's cookies and security headers on the way out.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::http::request::request_id;
use crate::observability::metrics;
use crate::security::{EdgeGuard, GuardStore};

pub async fn guard_middleware<S: GuardStore>(
    State(guard): State<Arc<EdgeGuard<S>>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = guard.client_id(&request);
    let facts = guard.facts(&request, client);

    let verdict = match guard.inspect(&facts, Utc::now()) {
        Ok(verdict) => verdict,
        Err(err) => {
            tracing::warn!(
                request_id = %request_id(&request),
                client = %facts.client,
                method = %facts.method,
                path = %facts.path,
                reason = err.reason(),
                "Request rejected"
            );
            metrics::record_rejection(err.reason());
            metrics::record_request("rejected");
            return err.into_response();
        }
    };

    let observe_login =
        guard.config().login.observe_upstream && guard.is_login_path(&facts.path);

    let mut response = next.run(request).await;

    if observe_login {
        if let Some(err) = guard.observe_login_response(&facts.client, response.status(), Utc::now()) {
            metrics::record_rejection(err.reason());
            metrics::record_request("rejected");
            return err.into_response();
        }
    }

    guard.apply(&verdict, response.headers_mut());
    metrics::record_request("passed");
    response
}
