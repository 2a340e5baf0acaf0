//! Data models

mod auth;
mod identity;
mod permission;
mod product;

pub use auth::*;
pub use identity::*;
pub use permission::*;
pub use product::*;
