//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{HeaderMap, StatusCode},
    routing::{any, post},
    Router,
};
use edge_guard::{GuardConfig, HttpServer, Shutdown};
use tokio::net::TcpListener;

pub const LOGIN_PATH: &str = "/api/auth/callback/credentials";
pub const GOOD_PASSWORD: &str = "hunter2";

/// Start a mock back-office. Returns the number of credential checks it ran.
///
/// The login route answers 200 when `x-password` matches, 401 otherwise;
/// every other route answers 200 "ok".
pub async fn start_mock_upstream(addr: SocketAddr) -> Arc<AtomicU32> {
    let checks = Arc::new(AtomicU32::new(0));
    let counter = checks.clone();

    let app = Router::new()
        .route(
            LOGIN_PATH,
            post(move |headers: HeaderMap| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let password = headers.get("x-password").and_then(|v| v.to_str().ok());
                    if password == Some(GOOD_PASSWORD) {
                        (StatusCode::OK, "welcome")
                    } else {
                        (StatusCode::UNAUTHORIZED, "bad credentials")
                    }
                }
            }),
        )
        .route("/{*path}", any(|| async { "ok" }));

    let listener = TcpListener::bind(addr).await.unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    checks
}

/// Start the guard on `addr` in front of `upstream`.
pub async fn start_guard(addr: SocketAddr, upstream: SocketAddr, configure: impl FnOnce(&mut GuardConfig)) -> Shutdown {
    let mut config = GuardConfig::default();
    config.listener.bind_address = addr.to_string();
    config.upstream.address = upstream.to_string();
    config.session.production = false;
    configure(&mut config);

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let listener = TcpListener::bind(addr).await.unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// `Set-Cookie` values of a response.
pub fn set_cookies(res: &reqwest::Response) -> Vec<String> {
    res.headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// Value of the named cookie among `Set-Cookie` headers.
#[allow(dead_code)]
pub fn cookie_value(res: &reqwest::Response, name: &str) -> Option<String> {
    set_cookies(res).into_iter().find_map(|c| {
        let pair = c.split(';').next()?;
        let (n, v) = pair.split_once('=')?;
        (n.trim() == name).then(|| v.trim().to_string())
    })
}
