//! Stage ordering of the gatekeeping pipeline

use axum::{
    body::Body,
    http::{header::RETRY_AFTER, Method, Request},
};

use crate::common::{basic, LogCapture, TestApp, ADMIN, DEFAULT_CLIENT, GUEST};

fn head(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::HEAD)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_rate_limited_request_skips_authentication() {
    let app = TestApp::with_rate_limit(1, 60);
    let auth = basic(ADMIN.username, ADMIN.password);

    app.get("/api/users/me", Some(&auth)).await.assert_ok();
    assert_eq!(app.validator.calls(), 1);

    let response = app.get("/api/users/me", Some(&auth)).await;
    response.assert_too_many_requests();
    assert_eq!(response.headers[RETRY_AFTER], "60");
    assert_eq!(app.validator.calls(), 1);
}

#[tokio::test]
async fn test_public_endpoint_ignores_credentials() {
    let app = TestApp::new();

    // Even garbage credentials are never looked at
    app.get("/api/health", Some("Basic ***"))
        .await
        .assert_ok();
    assert_eq!(app.validator.calls(), 0);
}

#[tokio::test]
async fn test_unauthenticated_beats_forbidden() {
    let app = TestApp::new();

    let response = app.get("/api/products", None).await;
    response.assert_unauthorized();
    assert_eq!(response.error_type(), "missing_credentials");
}

#[tokio::test]
async fn test_forbidden_request_does_not_reach_handler() {
    let app = TestApp::new();

    app.post_json(
        "/api/products",
        Some(&basic(GUEST.username, GUEST.password)),
        crate::common::product_body("Widget", "WID-1"),
    )
    .await
    .assert_forbidden();

    assert!(app.state.products.list().await.is_empty());
}

#[tokio::test]
async fn test_unknown_route_requires_identity() {
    let app = TestApp::new();

    app.get("/api/nowhere", None).await.assert_unauthorized();

    let response = app
        .get("/api/nowhere", Some(&basic(ADMIN.username, ADMIN.password)))
        .await;
    response.assert_not_found();
    assert_eq!(response.error_type(), "not_found");
}

#[tokio::test]
async fn test_identity_reaches_handler() {
    let app = TestApp::new();

    let response = app
        .get("/api/users/me", Some(&basic(ADMIN.username, ADMIN.password)))
        .await;

    response.assert_ok();
    assert_eq!(response.json::<serde_json::Value>()["id"], ADMIN.id);
}

#[tokio::test]
async fn test_head_follows_get_rule() {
    let app = TestApp::new();

    app.request_from(DEFAULT_CLIENT, head("/api/health"))
        .await
        .assert_ok();

    app.request_from(DEFAULT_CLIENT, head("/api/products"))
        .await
        .assert_unauthorized();

    let mut guarded = head("/api/products");
    guarded.headers_mut().insert(
        "Authorization",
        basic(GUEST.username, GUEST.password).parse().unwrap(),
    );
    app.request_from(DEFAULT_CLIENT, guarded)
        .await
        .assert_forbidden();
}

#[tokio::test]
async fn test_every_request_is_timed_and_logged() {
    let logs = LogCapture::default();
    let _guard = logs.install();
    let app = TestApp::with_rate_limit(2, 60);

    app.get("/api/health", None).await.assert_ok();
    app.get("/api/users/me", None).await.assert_unauthorized();
    app.get("/api/users/me", None)
        .await
        .assert_too_many_requests();

    let timings = logs.timing_events();
    let statuses: Vec<_> = timings
        .iter()
        .map(|event| event["fields"]["status"].as_u64())
        .collect();
    assert_eq!(statuses, vec![Some(200), Some(401), Some(429)]);

    for event in &timings[1..] {
        assert_eq!(event["level"], "INFO");
        assert_eq!(event["fields"]["path"], "/api/users/me");
        assert_eq!(event["fields"]["client"], DEFAULT_CLIENT);
        assert!(event["fields"]["elapsed_ms"].is_u64());
        assert!(event["fields"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Request for /api/users/me took "));
    }
}
