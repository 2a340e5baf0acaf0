//! In-memory product catalogue

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::RwLock;

use crate::models::{Product, ProductInput};

/// Products keyed by id, ids assigned in insertion order
#[derive(Debug)]
pub struct ProductCatalogue {
    products: RwLock<BTreeMap<i64, Product>>,
    next_id: AtomicI64,
}

impl Default for ProductCatalogue {
    fn default() -> Self {
        Self {
            products: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl ProductCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn list(&self) -> Vec<Product> {
        self.products.read().await.values().cloned().collect()
    }

    pub async fn get(&self, id: i64) -> Option<Product> {
        self.products.read().await.get(&id).cloned()
    }

    pub async fn create(&self, input: ProductInput) -> Product {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let product = Product {
            id,
            name: input.name,
            sku: input.sku,
        };
        self.products.write().await.insert(id, product.clone());
        product
    }

    /// Replace a product's fields; `None` if it does not exist
    pub async fn update(&self, id: i64, input: ProductInput) -> Option<Product> {
        let mut products = self.products.write().await;
        let product = products.get_mut(&id)?;
        product.name = input.name;
        product.sku = input.sku;
        Some(product.clone())
    }

    pub async fn delete(&self, id: i64) -> bool {
        self.products.write().await.remove(&id).is_some()
    }
}
