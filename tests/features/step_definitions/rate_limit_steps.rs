//! Rate limiting step definitions

use axum::http::header::RETRY_AFTER;
use cucumber::{given, then, when};

use crate::common::{TestApp, DEFAULT_CLIENT};
use crate::features::support::TestWorld;

#[given(expr = "a limit of {int} requests per {int} seconds")]
async fn rate_limit(world: &mut TestWorld, limit: u32, window_secs: u64) {
    world.app = TestApp::with_rate_limit(limit, window_secs);
}

#[when(expr = "I GET {string} {int} times")]
async fn get_repeatedly(world: &mut TestWorld, uri: String, times: usize) {
    for _ in 0..times {
        world.get(&uri).await;
    }
}

#[when(expr = "another client GETs {string}")]
async fn other_client(world: &mut TestWorld, uri: String) {
    let request = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = world.app.request_from("10.9.9.9", request).await;
    world.last_response = Some(response);
}

#[then(expr = "the response should ask me to retry after {int} seconds")]
async fn retry_after(world: &mut TestWorld, seconds: u64) {
    let header = world.response().headers[RETRY_AFTER]
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(header, seconds.to_string());
}

#[then(expr = "my request count should be {int}")]
async fn request_count(world: &mut TestWorld, count: u32) {
    let snapshot = world
        .app
        .limiter
        .snapshot(DEFAULT_CLIENT)
        .expect("client has no counter");
    assert_eq!(snapshot.count, count);
}
