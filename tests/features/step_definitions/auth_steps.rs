//! Authentication and token step definitions

use chrono::Duration;
use cucumber::{given, then, when};

use crate::common::user;
use crate::features::support::TestWorld;

#[when(expr = "I log in as {string} with password {string}")]
async fn log_in(world: &mut TestWorld, username: String, password: String) {
    world
        .post(
            "/api/users/auth",
            serde_json::json!({ "userName": username, "password": password }),
        )
        .await;
    if world.response().status.is_success() {
        let body: serde_json::Value = world.response().json();
        world.token = body["accessToken"].as_str().map(str::to_string);
    }
}

#[given(expr = "I hold a token for {string}")]
async fn hold_token(world: &mut TestWorld, username: String) {
    let user = user(&username);
    world.token = Some(world.app.login(user.username, user.password).await);
    world.use_token();
}

#[when("I use the token")]
async fn use_token(world: &mut TestWorld) {
    world.use_token();
}

#[when(expr = "{int} seconds pass")]
async fn seconds_pass(world: &mut TestWorld, seconds: i64) {
    world.app.clock.advance(Duration::seconds(seconds));
}

#[then("I receive an access token")]
async fn receive_token(world: &mut TestWorld) {
    let token = world.token.as_deref().expect("No token issued");
    assert_eq!(token.split('.').count(), 3);
}

#[then(expr = "the current user should be {string}")]
async fn current_user(world: &mut TestWorld, username: String) {
    let body: serde_json::Value = world.response().json();
    assert_eq!(body["name"], username);
}
