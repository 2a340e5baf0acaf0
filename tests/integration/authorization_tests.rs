//! Permission checks on the product catalogue

use std::sync::Arc;

use gatekeeper::{api, models::Permission, AppState};

use crate::common::{
    basic, product_body, test_config, TestApp, UnavailablePermissionStore, ADMIN, GUEST, READER,
};

#[tokio::test]
async fn test_reader_can_list_but_not_write() {
    let app = TestApp::new();
    let auth = basic(READER.username, READER.password);

    app.get("/api/products", Some(&auth)).await.assert_ok();

    let response = app
        .post_json("/api/products", Some(&auth), product_body("Widget", "WID-1"))
        .await;
    response.assert_forbidden();
    assert_eq!(response.error_type(), "forbidden");
}

#[tokio::test]
async fn test_guest_cannot_list() {
    let app = TestApp::new();

    app.get("/api/products", Some(&basic(GUEST.username, GUEST.password)))
        .await
        .assert_forbidden();
}

#[tokio::test]
async fn test_authenticated_only_endpoint_needs_no_grant() {
    let app = TestApp::new();
    let admin = basic(ADMIN.username, ADMIN.password);

    let created = app
        .post_json("/api/products", Some(&admin), product_body("Widget", "WID-1"))
        .await;
    created.assert_created();
    let id = created.json::<serde_json::Value>()["id"].as_i64().unwrap();

    // Reading one product only requires an identity
    app.get(
        &format!("/api/products/{}", id),
        Some(&basic(GUEST.username, GUEST.password)),
    )
    .await
    .assert_ok();
}

#[tokio::test]
async fn test_grant_takes_effect_on_next_request() {
    let app = TestApp::new();
    let auth = basic(GUEST.username, GUEST.password);

    app.get("/api/products", Some(&auth)).await.assert_forbidden();

    app.permissions.grant(GUEST.id, Permission::ReadProducts);
    app.get("/api/products", Some(&auth)).await.assert_ok();

    app.permissions.revoke(GUEST.id, Permission::ReadProducts);
    app.get("/api/products", Some(&auth)).await.assert_forbidden();
}

#[tokio::test]
async fn test_bearer_identity_is_authorized_by_subject() {
    let app = TestApp::new();
    let token = app.login(READER.username, READER.password).await;

    app.get("/api/products", Some(&crate::common::bearer(&token)))
        .await
        .assert_ok();
}

#[tokio::test]
async fn test_full_product_lifecycle_as_admin() {
    let app = TestApp::new();
    let admin = basic(ADMIN.username, ADMIN.password);

    let created = app
        .post_json("/api/products", Some(&admin), product_body("Widget", "WID-1"))
        .await;
    created.assert_created();
    let id = created.json::<serde_json::Value>()["id"].as_i64().unwrap();
    let uri = format!("/api/products/{}", id);

    let updated = app
        .put_json(&uri, Some(&admin), product_body("Widget Pro", "WID-2"))
        .await;
    updated.assert_ok();
    assert_eq!(updated.json::<serde_json::Value>()["sku"], "WID-2");

    let list = app.get("/api/products", Some(&admin)).await;
    assert_eq!(list.json::<Vec<serde_json::Value>>().len(), 1);

    app.delete(&uri, Some(&admin))
        .await
        .assert_status(axum::http::StatusCode::NO_CONTENT);
    app.get(&uri, Some(&admin)).await.assert_not_found();
}

#[tokio::test]
async fn test_invalid_product_body_is_rejected_after_authorization() {
    let app = TestApp::new();

    app.post_json(
        "/api/products",
        Some(&basic(ADMIN.username, ADMIN.password)),
        product_body("", "lowercase"),
    )
    .await
    .assert_bad_request();
}

#[tokio::test]
async fn test_permission_store_outage_denies() {
    let app = TestApp::new();
    let state = AppState::new(
        test_config(),
        app.identities.clone(),
        Arc::new(UnavailablePermissionStore),
        app.clock.clone(),
    )
    .unwrap();
    let limiter = state.rate_limiter();
    let router = api::create_router(state, limiter);
    let app = TestApp { router, ..app };

    app.get("/api/products", Some(&basic(ADMIN.username, ADMIN.password)))
        .await
        .assert_forbidden();
}
