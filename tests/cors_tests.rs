//! Cross-origin behaviour of the assembled router.

mod common;

use axum::http::Method;
use common::{EVIL, FRONTEND, Harness, ProbeStore, config, epoch};
use projecthub::session::ManualClock;
use projecthub::testing;
use projecthub::{ConfigBuilder, CorsConfig, SessionConfig};
use std::sync::Arc;

#[tokio::test]
async fn test_preflight_never_touches_session_store() {
    let clock = ManualClock::new(epoch());
    let store = Arc::new(ProbeStore::new(clock.clone()));
    let harness = Harness::with_store(config(), clock, store.clone()).await;
    let cookie = harness.login().await;
    let before = store.lookups();

    let response = testing::preflight(harness.router(), "/api/user/current", FRONTEND, Method::GET)
        .header("access-control-request-headers", "content-type")
        .cookie(&cookie)
        .execute()
        .await
        .assert_ok()
        .assert_header("access-control-allow-origin", FRONTEND)
        .assert_header("access-control-allow-credentials", "true");

    let methods = response.header("access-control-allow-methods").unwrap();
    for method in ["GET", "POST", "PUT", "DELETE", "OPTIONS"] {
        assert!(methods.contains(method), "missing {} in {}", method, methods);
    }
    assert!(response.header("access-control-max-age").is_some());
    assert!(response.set_cookie("sessionId").is_none());

    assert_eq!(store.lookups(), before);
}

#[tokio::test]
async fn test_preflight_for_protected_route_without_session_succeeds() {
    let harness = Harness::new().await;

    testing::preflight(harness.router(), "/api/user/current", FRONTEND, Method::DELETE)
        .execute()
        .await
        .assert_ok();
}

#[tokio::test]
async fn test_foreign_origin_gets_no_credentials_grant() {
    let harness = Harness::new().await;

    testing::get(harness.router(), "/health")
        .origin(EVIL)
        .execute()
        .await
        // Never echoes the caller's origin
        .assert_header("access-control-allow-origin", FRONTEND)
        .assert_no_header("access-control-allow-credentials");
}

#[tokio::test]
async fn test_cookie_from_foreign_origin_is_ignored() {
    let harness = Harness::new().await;
    let cookie = harness.login().await;

    let response = testing::get(harness.router(), "/api/user/current")
        .origin(EVIL)
        .cookie(&cookie)
        .execute()
        .await
        .assert_unauthorized()
        .assert_no_header("access-control-allow-credentials");
    assert!(response.set_cookie("sessionId").is_none());

    // The session itself is untouched
    testing::get(harness.router(), "/api/user/current")
        .origin(FRONTEND)
        .cookie(&cookie)
        .execute()
        .await
        .assert_ok();
}

#[tokio::test]
async fn test_logout_from_foreign_origin_keeps_session() {
    let harness = Harness::new().await;
    let cookie = harness.login().await;

    testing::post(harness.router(), "/api/auth/logout")
        .origin(EVIL)
        .cookie(&cookie)
        .execute()
        .await
        .assert_ok();

    testing::get(harness.router(), "/api/user/current")
        .origin(FRONTEND)
        .cookie(&cookie)
        .execute()
        .await
        .assert_ok();
}

#[tokio::test]
async fn test_same_origin_deployment_sends_no_cors_headers() {
    let config = ConfigBuilder::new()
        .with_session(SessionConfig {
            secret: Some(common::SECRET.to_string()),
            ..Default::default()
        })
        .build()
        .unwrap();
    let harness = Harness::with_config(config).await;
    let cookie = harness.login().await;

    testing::get(harness.router(), "/api/user/current")
        .cookie(&cookie)
        .execute()
        .await
        .assert_ok()
        .assert_no_header("access-control-allow-origin");
}

#[test]
fn test_wildcard_origin_with_credentials_refuses_to_start() {
    let err = ConfigBuilder::new()
        .with_cors(CorsConfig::for_origin("*"))
        .with_session_secret(common::SECRET)
        .build()
        .unwrap_err();

    assert!(err.to_string().contains("wildcard"));
}

#[test]
fn test_wildcard_origin_without_credentials_is_accepted() {
    let cors = CorsConfig::builder().allow_origin("*").allow_credentials(false).build();

    ConfigBuilder::new()
        .with_cors(cors)
        .with_session_secret(common::SECRET)
        .build()
        .unwrap();
}
