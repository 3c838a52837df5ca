//! End-to-end tests of the guard in front of a mock back-office.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;

mod common;

use common::{client, cookie_value, set_cookies, GOOD_PASSWORD, LOGIN_PATH};

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

#[tokio::test]
async fn test_eleventh_login_in_window_is_rate_limited() {
    let upstream = addr(28381);
    let proxy = addr(28382);
    let checks = common::start_mock_upstream(upstream).await;
    let shutdown = common::start_guard(proxy, upstream, |c| {
        c.login.observe_upstream = false;
    })
    .await;

    let client = client();
    let url = format!("http://{proxy}{LOGIN_PATH}");
    for _ in 0..10 {
        let res = client
            .post(&url)
            .header("x-forwarded-for", "1.2.3.4")
            .send()
            .await
            .expect("Guard unreachable");
        assert_eq!(res.status(), 401);
    }
    assert_eq!(checks.load(Ordering::SeqCst), 10);

    let res = client
        .post(&url)
        .header("x-forwarded-for", "1.2.3.4")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 429);
    assert_eq!(
        res.text().await.unwrap(),
        r#"{"error":"Too many requests. Please try again later."}"#
    );
    assert_eq!(checks.load(Ordering::SeqCst), 10, "Rejected request reached the upstream");

    // Another client still has its own window.
    let res = client
        .post(&url)
        .header("x-forwarded-for", "5.6.7.8")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    shutdown.trigger();
}

#[tokio::test]
async fn test_five_failures_lock_the_client() {
    let upstream = addr(28383);
    let proxy = addr(28384);
    let checks = common::start_mock_upstream(upstream).await;
    let shutdown = common::start_guard(proxy, upstream, |_| {}).await;

    let client = client();
    let url = format!("http://{proxy}{LOGIN_PATH}");
    let login = |password: &'static str| {
        client
            .post(&url)
            .header("x-forwarded-for", "1.2.3.4")
            .header("x-password", password)
            .send()
    };

    for _ in 0..4 {
        assert_eq!(login("wrong").await.unwrap().status(), 401);
    }

    let before = Utc::now();
    let res = login("wrong").await.unwrap();
    assert_eq!(res.status(), 429);
    let body: Value = res.json().await.unwrap();
    let locked_until: DateTime<Utc> = body["lockedUntil"].as_str().unwrap().parse().unwrap();
    let after = Utc::now();
    assert!(locked_until >= before + TimeDelta::minutes(15) - TimeDelta::milliseconds(1));
    assert!(locked_until <= after + TimeDelta::minutes(15));
    assert_eq!(checks.load(Ordering::SeqCst), 5);

    // Even the right password is refused without reaching the credential check.
    let res = login(GOOD_PASSWORD).await.unwrap();
    assert_eq!(res.status(), 429);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["lockedUntil"].as_str().unwrap().parse::<DateTime<Utc>>().unwrap(), locked_until);
    assert_eq!(checks.load(Ordering::SeqCst), 5);

    shutdown.trigger();
}

#[tokio::test]
async fn test_success_resets_failure_count() {
    let upstream = addr(28385);
    let proxy = addr(28386);
    let checks = common::start_mock_upstream(upstream).await;
    let shutdown = common::start_guard(proxy, upstream, |_| {}).await;

    let client = client();
    let url = format!("http://{proxy}{LOGIN_PATH}");
    let login = |password: &'static str| {
        client
            .post(&url)
            .header("x-forwarded-for", "1.2.3.4")
            .header("x-password", password)
            .send()
    };

    for _ in 0..4 {
        assert_eq!(login("wrong").await.unwrap().status(), 401);
    }
    assert_eq!(login(GOOD_PASSWORD).await.unwrap().status(), 200);
    for _ in 0..4 {
        assert_eq!(login("wrong").await.unwrap().status(), 401);
    }
    assert_eq!(checks.load(Ordering::SeqCst), 9);

    shutdown.trigger();
}

#[tokio::test]
async fn test_csrf_double_submit() {
    let upstream = addr(28387);
    let proxy = addr(28388);
    common::start_mock_upstream(upstream).await;
    let shutdown = common::start_guard(proxy, upstream, |_| {}).await;
    let client = client();

    // First visit issues a token.
    let res = client.get(format!("http://{proxy}/dashboard")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let token = cookie_value(&res, "csrf-token").expect("No csrf-token cookie issued");
    assert_eq!(token.len(), 64);
    assert_eq!(res.headers()["x-csrf-token"], token.as_str());

    let url = format!("http://{proxy}/api/bookings/17");
    let cookie = format!("csrf-token={token}");

    let res = client.patch(&url).header("cookie", &cookie).send().await.unwrap();
    assert_eq!(res.status(), 403);
    assert_eq!(res.text().await.unwrap(), r#"{"error":"Invalid CSRF token"}"#);

    let res = client
        .patch(&url)
        .header("cookie", &cookie)
        .header("x-csrf-token", "0".repeat(64))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    let res = client
        .patch(&url)
        .header("cookie", &cookie)
        .header("x-csrf-token", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(cookie_value(&res, "csrf-token").is_none(), "Token reissued to a client that has one");

    shutdown.trigger();
}

#[tokio::test]
async fn test_session_cookie_and_security_headers() {
    let upstream = addr(28389);
    let proxy = addr(28390);
    common::start_mock_upstream(upstream).await;
    let shutdown = common::start_guard(proxy, upstream, |_| {}).await;

    let res = client()
        .get(format!("http://{proxy}/providers"))
        .header("cookie", "session=abc123; csrf-token=t")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let headers = res.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-xss-protection"], "1; mode=block");
    assert_eq!(headers["referrer-policy"], "no-referrer");
    assert!(headers.contains_key("x-request-id"));

    let cookies = set_cookies(&res);
    assert_eq!(cookies.len(), 1);
    let session = &cookies[0];
    assert!(session.starts_with("session=abc123"));
    assert!(session.contains("HttpOnly"));
    assert!(session.contains("SameSite=Strict"));
    assert!(session.contains("Max-Age=1800"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_down_is_bad_gateway() {
    // Nothing listens on the upstream port.
    let upstream = addr(28391);
    let proxy = addr(28392);
    let shutdown = common::start_guard(proxy, upstream, |_| {}).await;

    let res = client().get(format!("http://{proxy}/payments")).send().await.unwrap();
    assert_eq!(res.status(), 502);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Upstream request failed");

    shutdown.trigger();
}

#[tokio::test]
async fn test_admin_unlock() {
    let upstream = addr(28393);
    let proxy = addr(28394);
    let checks = common::start_mock_upstream(upstream).await;
    let shutdown = common::start_guard(proxy, upstream, |c| {
        c.login.max_attempts = 2;
        c.admin.enabled = true;
        c.admin.api_key = "admin-key".into();
    })
    .await;

    let client = client();
    let url = format!("http://{proxy}{LOGIN_PATH}");
    for _ in 0..2 {
        client.post(&url).header("x-forwarded-for", "1.2.3.4").send().await.unwrap();
    }
    let res = client.post(&url).header("x-forwarded-for", "1.2.3.4").send().await.unwrap();
    assert_eq!(res.status(), 429);

    let admin = format!("http://{proxy}/_guard/clients/1.2.3.4");
    let res = client.get(&admin).bearer_auth("admin-key").send().await.unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["login"]["state"], "locked");

    let res = client.delete(&admin).bearer_auth("admin-key").send().await.unwrap();
    assert_eq!(res.status(), 204);

    let res = client
        .post(&url)
        .header("x-forwarded-for", "1.2.3.4")
        .header("x-password", GOOD_PASSWORD)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(checks.load(Ordering::SeqCst), 3);

    shutdown.trigger();
}
