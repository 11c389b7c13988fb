//! Product store backed by a PostgREST table.

use ahash::AHashMap;
use async_trait::async_trait;

use crate::catalog::ProductStore;
use crate::error::{Result, SearchStage};
use crate::product::Product;
use crate::supabase::client::{SupabaseClient, in_filter};

/// Ids fetched per `in.(..)` request, keeping URLs well under common limits.
const IDS_PER_REQUEST: usize = 100;

/// [`ProductStore`] over a table with columns `id, name, description, price, imageId`.
#[derive(Debug, Clone)]
pub struct SupabaseProductStore {
    client: SupabaseClient,
    table: String,
}

impl SupabaseProductStore {
    pub fn new(client: SupabaseClient, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

#[async_trait]
impl ProductStore for SupabaseProductStore {
    async fn get_many(&self, ids: &[String]) -> Result<Vec<Option<Product>>> {
        let mut found: AHashMap<String, Product> = AHashMap::with_capacity(ids.len());
        for chunk in ids.chunks(IDS_PER_REQUEST) {
            let params = [("select", "*".to_string()), ("id", in_filter(chunk))];
            let rows: Vec<Product> = self
                .client
                .select(SearchStage::Other, &self.table, &params)
                .await?;
            found.extend(rows.into_iter().map(|p| (p.id.clone(), p)));
        }
        Ok(ids.iter().map(|id| found.get(id).cloned()).collect())
    }

    async fn insert(&self, products: Vec<Product>) -> Result<()> {
        for product in &products {
            product.validate()?;
        }
        self.client
            .upsert(SearchStage::Other, &self.table, &products)
            .await
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        self.client
            .delete_ids(SearchStage::Other, &self.table, ids)
            .await
    }

    async fn delete_all(&self) -> Result<()> {
        self.client.delete_all(SearchStage::Other, &self.table).await
    }

    async fn count(&self) -> Result<usize> {
        self.client.count(SearchStage::Other, &self.table).await
    }
}
