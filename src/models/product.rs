//! Product catalogue models

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::validation::{validate_not_blank, validate_sku};

/// A catalogue entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub sku: String,
}

/// Body of create and update requests
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductInput {
    #[validate(length(max = 200), custom(function = "validate_not_blank"))]
    pub name: String,
    #[validate(custom(function = "validate_sku"))]
    pub sku: String,
}
