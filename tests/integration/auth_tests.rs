//! Authentication and token issuance tests

use axum::{
    body::Body,
    http::{header::WWW_AUTHENTICATE, Request, StatusCode},
};
use chrono::Duration;
use rstest::rstest;

use crate::common::{basic, bearer, TestApp, ADMIN, DEFAULT_CLIENT, GUEST, READER};

#[tokio::test]
async fn test_issue_token_returns_access_token() {
    let app = TestApp::new();

    let response = app
        .post_json(
            "/api/users/auth",
            None,
            serde_json::json!({ "userName": ADMIN.username, "password": ADMIN.password }),
        )
        .await;

    response.assert_ok();
    let body: serde_json::Value = response.json();
    let token = body["accessToken"].as_str().unwrap();
    assert_eq!(token.split('.').count(), 3);
    assert_eq!(body.as_object().unwrap().len(), 1);
}

#[tokio::test]
async fn test_issue_token_rejects_bad_password() {
    let app = TestApp::new();

    let response = app
        .post_json(
            "/api/users/auth",
            None,
            serde_json::json!({ "userName": ADMIN.username, "password": "nope" }),
        )
        .await;

    response.assert_unauthorized();
    assert_eq!(response.error_type(), "unauthorized");
}

#[tokio::test]
async fn test_issue_token_rejects_blank_fields() {
    let app = TestApp::new();

    let response = app
        .post_json(
            "/api/users/auth",
            None,
            serde_json::json!({ "userName": "  ", "password": "" }),
        )
        .await;

    response.assert_bad_request();
    assert_eq!(response.error_type(), "validation_error");
    assert_eq!(app.validator.calls(), 0);
}

#[tokio::test]
async fn test_issue_token_missing_field_is_400() {
    let app = TestApp::new();

    let response = app
        .post_json(
            "/api/users/auth",
            None,
            serde_json::json!({ "userName": ADMIN.username }),
        )
        .await;

    response.assert_bad_request();
    assert_eq!(response.error_type(), "bad_request");
    assert_eq!(app.validator.calls(), 0);
}

#[tokio::test]
async fn test_issue_token_malformed_json_is_400() {
    let app = TestApp::new();

    let request = Request::builder()
        .method("POST")
        .uri("/api/users/auth")
        .header("Content-Type", "application/json")
        .body(Body::from("{\"userName\": "))
        .unwrap();
    let response = app.request_from(DEFAULT_CLIENT, request).await;

    response.assert_bad_request();
    assert_eq!(response.error_type(), "bad_request");
    assert_eq!(app.validator.calls(), 0);
}

#[tokio::test]
async fn test_issue_token_store_outage_is_503() {
    let app = TestApp::new();
    app.validator.set_failing(true);

    let response = app
        .post_json(
            "/api/users/auth",
            None,
            serde_json::json!({ "userName": ADMIN.username, "password": ADMIN.password }),
        )
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_bearer_token_authenticates() {
    let app = TestApp::new();
    let token = app.login(READER.username, READER.password).await;

    let response = app.get("/api/users/me", Some(&bearer(&token))).await;

    response.assert_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["id"], READER.id);
    assert_eq!(body["name"], READER.username);
}

#[tokio::test]
async fn test_basic_credentials_authenticate() {
    let app = TestApp::new();

    let response = app
        .get("/api/users/me", Some(&basic(GUEST.username, GUEST.password)))
        .await;

    response.assert_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["name"], GUEST.username);
}

#[tokio::test]
async fn test_missing_credentials() {
    let app = TestApp::new();

    let response = app.get("/api/users/me", None).await;

    response.assert_unauthorized();
    assert_eq!(response.error_type(), "missing_credentials");
    assert!(response.headers.contains_key(WWW_AUTHENTICATE));
}

#[rstest]
#[case::bad_base64("Basic ***")]
#[case::missing_colon(&format!("Basic {}", base64_of("adminpassword")))]
#[case::unknown_scheme("Token abc")]
#[tokio::test]
async fn test_malformed_credentials(#[case] header: &str) {
    let app = TestApp::new();

    let response = app.get("/api/users/me", Some(header)).await;

    response.assert_unauthorized();
    assert_eq!(response.error_type(), "malformed_credentials");
    assert_eq!(app.validator.calls(), 0);
}

#[tokio::test]
async fn test_wrong_basic_password() {
    let app = TestApp::new();

    let response = app
        .get("/api/users/me", Some(&basic(ADMIN.username, "wrong")))
        .await;

    response.assert_unauthorized();
    assert_eq!(response.error_type(), "invalid_credentials");
}

#[tokio::test]
async fn test_unknown_user_looks_like_wrong_password() {
    let app = TestApp::new();

    let unknown = app
        .get("/api/users/me", Some(&basic("mallory", "password")))
        .await;
    let wrong = app
        .get("/api/users/me", Some(&basic(ADMIN.username, "wrong")))
        .await;

    unknown.assert_unauthorized();
    assert_eq!(unknown.body, wrong.body);
}

#[tokio::test]
async fn test_token_expiry_boundary() {
    let app = TestApp::new();
    let token = app.login(ADMIN.username, ADMIN.password).await;
    let lifetime = app.state.token_issuer.lifetime();

    app.clock.advance(lifetime - Duration::seconds(1));
    app.get("/api/users/me", Some(&bearer(&token)))
        .await
        .assert_ok();

    app.clock.advance(Duration::seconds(2));
    let response = app.get("/api/users/me", Some(&bearer(&token))).await;
    response.assert_unauthorized();
    assert_eq!(response.error_type(), "invalid_token");
}

#[tokio::test]
async fn test_tampered_token_rejected() {
    let app = TestApp::new();
    let token = app.login(ADMIN.username, ADMIN.password).await;

    // Swap the first character of the signature segment
    let (signed, signature) = token.rsplit_once('.').unwrap();
    let first = signature.chars().next().unwrap();
    let replacement = if first == 'A' { 'B' } else { 'A' };
    let tampered = format!("{}.{}{}", signed, replacement, &signature[1..]);

    let response = app.get("/api/users/me", Some(&bearer(&tampered))).await;
    response.assert_unauthorized();
    assert_eq!(response.error_type(), "invalid_token");
}

#[tokio::test]
async fn test_token_from_other_issuer_rejected() {
    let app = TestApp::new();

    let mut config = crate::common::test_config();
    config.auth.issuer = "someone-else".to_string();
    let other = TestApp::with_config(config);
    let foreign = other.login(ADMIN.username, ADMIN.password).await;

    let response = app.get("/api/users/me", Some(&bearer(&foreign))).await;
    response.assert_unauthorized();
    assert_eq!(response.error_type(), "invalid_token");
}

fn base64_of(raw: &str) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    STANDARD.encode(raw)
}
