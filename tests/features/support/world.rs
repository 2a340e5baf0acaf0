//! Test world for Cucumber scenarios

use cucumber::World;

use crate::common::{basic, bearer, TestApp, TestResponse};

/// Test world that maintains state across scenario steps
#[derive(Debug, Default, World)]
pub struct TestWorld {
    /// Application under test, rebuilt per scenario
    pub app: TestApp,

    /// `Authorization` header sent with subsequent requests
    pub authorization: Option<String>,

    /// Token from the last successful login
    pub token: Option<String>,

    /// Response from last API call
    pub last_response: Option<TestResponse>,
}

impl TestWorld {
    /// Send Basic credentials for a fixture user
    pub fn use_basic(&mut self, username: &str, password: &str) {
        self.authorization = Some(basic(username, password));
    }

    /// Send the last issued token as a bearer credential
    pub fn use_token(&mut self) {
        let token = self.token.as_deref().expect("No token issued yet");
        self.authorization = Some(bearer(token));
    }

    pub async fn get(&mut self, uri: &str) {
        let response = self.app.get(uri, self.authorization.as_deref()).await;
        self.last_response = Some(response);
    }

    pub async fn post(&mut self, uri: &str, body: serde_json::Value) {
        let response = self
            .app
            .post_json(uri, self.authorization.as_deref(), body)
            .await;
        self.last_response = Some(response);
    }

    pub async fn delete(&mut self, uri: &str) {
        let response = self.app.delete(uri, self.authorization.as_deref()).await;
        self.last_response = Some(response);
    }

    pub fn response(&self) -> &TestResponse {
        self.last_response.as_ref().expect("No response available")
    }
}
