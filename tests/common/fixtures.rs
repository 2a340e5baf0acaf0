//! Test fixtures for common test data
//!
//! Fixed users and grants seeded into every test application.

use gatekeeper::{
    models::Permission,
    services::{InMemoryIdentityStore, InMemoryPermissionStore},
};

/// Client address used when a test does not pick one
pub const DEFAULT_CLIENT: &str = "10.0.0.1";

/// A seeded user and the password it was created with
#[derive(Debug, Clone, Copy)]
pub struct TestUser {
    pub id: i64,
    pub username: &'static str,
    pub password: &'static str,
    pub permissions: &'static [Permission],
}

/// Every permission
pub const ADMIN: TestUser = TestUser {
    id: 1,
    username: "admin",
    password: "password",
    permissions: &[
        Permission::ReadProducts,
        Permission::WriteProducts,
        Permission::DeleteProducts,
        Permission::ManageUsers,
    ],
};

/// Read-only catalogue access
pub const READER: TestUser = TestUser {
    id: 2,
    username: "reader",
    password: "reader-pass",
    permissions: &[Permission::ReadProducts],
};

/// Authenticates but holds no grants
pub const GUEST: TestUser = TestUser {
    id: 3,
    username: "guest",
    password: "guest-pass",
    permissions: &[],
};

pub const ALL_USERS: [TestUser; 3] = [ADMIN, READER, GUEST];

/// Look up a fixture user by name
pub fn user(username: &str) -> TestUser {
    ALL_USERS
        .into_iter()
        .find(|u| u.username == username)
        .unwrap_or_else(|| panic!("no fixture user named {}", username))
}

/// Seed the fixture users and their grants
pub fn seed_users(identities: &InMemoryIdentityStore, permissions: &InMemoryPermissionStore) {
    for user in ALL_USERS {
        identities
            .add_user(user.id, user.username, user.password)
            .expect("Failed to seed user");
        for permission in user.permissions {
            permissions.grant(user.id, *permission);
        }
    }
}

/// Product body accepted by the create and update endpoints
pub fn product_body(name: &str, sku: &str) -> serde_json::Value {
    serde_json::json!({ "name": name, "sku": sku })
}
