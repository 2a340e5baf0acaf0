//! Permission model
//!
//! The permission set is closed: every identifier the service can check is a
//! variant here, and each carries the stable numeric id used by the stores.

use serde::{Deserialize, Serialize};

/// An action a user can be granted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// List and read products
    ReadProducts,
    /// Create and update products
    WriteProducts,
    /// Delete products
    DeleteProducts,
    /// Administer users and grants
    ManageUsers,
}

impl Permission {
    /// Get all available permissions
    pub fn all() -> [Permission; 4] {
        [
            Permission::ReadProducts,
            Permission::WriteProducts,
            Permission::DeleteProducts,
            Permission::ManageUsers,
        ]
    }

    /// Stable identifier persisted in `user_permissions.permission_id`
    pub fn id(self) -> i64 {
        match self {
            Permission::ReadProducts => 1,
            Permission::WriteProducts => 2,
            Permission::DeleteProducts => 3,
            Permission::ManageUsers => 4,
        }
    }

    /// Inverse of [`Permission::id`]
    pub fn from_id(id: i64) -> Option<Self> {
        Self::all().into_iter().find(|p| p.id() == id)
    }

    /// Get the string representation
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::ReadProducts => "read_products",
            Permission::WriteProducts => "write_products",
            Permission::DeleteProducts => "delete_products",
            Permission::ManageUsers => "manage_users",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Invalid permission: {}", s))
    }
}
