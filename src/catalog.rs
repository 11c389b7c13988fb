//! Product store.
//!
//! The catalog is the source of truth the retriever joins index hits
//! against. Indexes only hand back ids; every id must resolve here.

use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::product::Product;

/// Storage contract for full product records.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Look up products by id. The result has one slot per requested id, in
    /// request order; unknown ids yield `None`.
    async fn get_many(&self, ids: &[String]) -> Result<Vec<Option<Product>>>;

    /// Insert or replace products by id.
    async fn insert(&self, products: Vec<Product>) -> Result<()>;

    /// Remove the products with the given ids. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<()>;

    /// Remove every product, ahead of a full reseed.
    async fn delete_all(&self) -> Result<()>;

    /// Number of stored products.
    async fn count(&self) -> Result<usize>;
}

/// In-memory product store.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    products: RwLock<AHashMap<String, Product>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog pre-filled with `products`.
    pub fn with_products(products: Vec<Product>) -> Self {
        let map = products.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self {
            products: RwLock::new(map),
        }
    }

    /// Fetch a single product.
    pub fn get(&self, id: &str) -> Option<Product> {
        self.products.read().get(id).cloned()
    }
}

#[async_trait]
impl ProductStore for MemoryCatalog {
    async fn get_many(&self, ids: &[String]) -> Result<Vec<Option<Product>>> {
        let products = self.products.read();
        Ok(ids.iter().map(|id| products.get(id).cloned()).collect())
    }

    async fn insert(&self, products: Vec<Product>) -> Result<()> {
        for product in &products {
            product.validate()?;
        }
        let mut map = self.products.write();
        for product in products {
            map.insert(product.id.clone(), product);
        }
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut map = self.products.write();
        for id in ids {
            map.remove(id);
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.products.write().clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.products.read().len())
    }
}
