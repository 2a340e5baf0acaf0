//! Permission step definitions

use cucumber::{given, when};

use gatekeeper::models::Permission;

use crate::common::{product_body, user};
use crate::features::support::TestWorld;

fn permission(name: &str) -> Permission {
    match name {
        "ReadProducts" => Permission::ReadProducts,
        "WriteProducts" => Permission::WriteProducts,
        "DeleteProducts" => Permission::DeleteProducts,
        "ManageUsers" => Permission::ManageUsers,
        other => panic!("unknown permission {}", other),
    }
}

#[given(expr = "{string} is granted {word}")]
async fn grant(world: &mut TestWorld, username: String, name: String) {
    world.app.permissions.grant(user(&username).id, permission(&name));
}

#[given(expr = "{string} loses {word}")]
async fn revoke(world: &mut TestWorld, username: String, name: String) {
    world.app.permissions.revoke(user(&username).id, permission(&name));
}

#[when(expr = "I create a product named {string} with sku {string}")]
async fn create_product(world: &mut TestWorld, name: String, sku: String) {
    world.post("/api/products", product_body(&name, &sku)).await;
}
