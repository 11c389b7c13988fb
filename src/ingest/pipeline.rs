//! Bounded-concurrency reseeding pipeline.
//!
//! A reseed wipes the product store and both indexes, then embeds every
//! product's search text in batches and writes each product to all three
//! stores. Each product is written to the catalog before either index, so
//! any id an index can return resolves to a product. A product whose writes
//! fail part way is removed again from the stores it reached. Every item's
//! outcome is collected into the [`IngestReport`].

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::catalog::ProductStore;
use crate::embedding::{TextEmbedder, check_dimension};
use crate::error::{KioskError, Result};
use crate::ingest::seed::{ProductSeed, products_from_seeds};
use crate::keyword_index::KeywordIndex;
use crate::product::Product;
use crate::vector_index::VectorIndex;

/// Pipeline tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Texts sent per embedding request.
    pub batch_size: usize,
    /// Maximum embedding requests, and separately product writes, in flight.
    pub concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            concurrency: num_cpus::get().max(1),
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(KioskError::config("ingest batch size must be positive"));
        }
        if self.concurrency == 0 {
            return Err(KioskError::config("ingest concurrency must be positive"));
        }
        Ok(())
    }
}

/// A product that could not be ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestFailure {
    pub id: String,
    pub message: String,
}

/// Outcome of one reseed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: Vec<IngestFailure>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl IngestReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Single-writer reseeding pipeline over the three stores.
pub struct IngestPipeline {
    embedder: Arc<dyn TextEmbedder>,
    vector_index: Arc<dyn VectorIndex>,
    keyword_index: Arc<dyn KeywordIndex>,
    catalog: Arc<dyn ProductStore>,
    config: IngestConfig,
    writer: Mutex<()>,
}

type Embedded = std::result::Result<(Product, Vec<f32>), IngestFailure>;

impl IngestPipeline {
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        vector_index: Arc<dyn VectorIndex>,
        keyword_index: Arc<dyn KeywordIndex>,
        catalog: Arc<dyn ProductStore>,
        config: IngestConfig,
    ) -> Result<Self> {
        config.validate()?;
        if embedder.dimension() != vector_index.dimension() {
            return Err(KioskError::DimensionMismatch {
                expected: vector_index.dimension(),
                actual: embedder.dimension(),
            });
        }
        Ok(Self {
            embedder,
            vector_index,
            keyword_index,
            catalog,
            config,
            writer: Mutex::new(()),
        })
    }

    /// Build products from seed entries and reseed with them.
    pub async fn reseed_from_seeds(&self, seeds: &[ProductSeed]) -> Result<IngestReport> {
        let products = products_from_seeds(seeds);
        self.reseed(products).await
    }

    /// Replace the whole corpus with `products`.
    ///
    /// Fails outright only if a store cannot be wiped; per-product failures
    /// are reported in the returned [`IngestReport`]. Concurrent calls on the
    /// same pipeline run one after another.
    pub async fn reseed(&self, products: Vec<Product>) -> Result<IngestReport> {
        let _writer = self.writer.lock().await;
        let started_at = Utc::now();
        let started = Instant::now();
        let total = products.len();

        self.catalog.delete_all().await?;
        self.vector_index.delete_all().await?;
        self.keyword_index.delete_all().await?;
        info!("cleared product store and indexes, ingesting {total} products");

        let batches: Vec<Vec<Product>> = products
            .chunks(self.config.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();

        let embedded: Vec<Embedded> = stream::iter(batches)
            .map(|batch| self.embed_batch(batch))
            .buffered(self.config.concurrency)
            .flat_map(stream::iter)
            .collect()
            .await;

        let mut failed = Vec::new();
        let mut ready = Vec::with_capacity(embedded.len());
        for item in embedded {
            match item {
                Ok(pair) => ready.push(pair),
                Err(failure) => failed.push(failure),
            }
        }

        let outcomes: Vec<std::result::Result<(), IngestFailure>> = stream::iter(ready)
            .map(|(product, vector)| self.write_product(product, vector))
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        let mut succeeded = 0;
        for outcome in outcomes {
            match outcome {
                Ok(()) => succeeded += 1,
                Err(failure) => failed.push(failure),
            }
        }
        failed.sort_by(|a, b| a.id.cmp(&b.id));

        let report = IngestReport {
            total,
            succeeded,
            failed,
            started_at,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "ingested {}/{} products in {} ms ({} failed)",
            report.succeeded,
            report.total,
            report.elapsed_ms,
            report.failed.len()
        );
        Ok(report)
    }

    /// Embed one batch. A failed request fails every product in it.
    async fn embed_batch(&self, batch: Vec<Product>) -> Vec<Embedded> {
        let mut valid = Vec::with_capacity(batch.len());
        let mut results = Vec::with_capacity(batch.len());
        for product in batch {
            match product.validate() {
                Ok(()) => valid.push(product),
                Err(err) => results.push(Err(failure(&product.id, &err))),
            }
        }
        if valid.is_empty() {
            return results;
        }

        let texts: Vec<String> = valid.iter().map(Product::search_text).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        match self.embedder.embed_batch(&refs).await {
            Ok(vectors) if vectors.len() == valid.len() => {
                for (product, vector) in valid.into_iter().zip(vectors) {
                    match check_dimension(self.vector_index.dimension(), &vector) {
                        Ok(()) => results.push(Ok((product, vector))),
                        Err(err) => results.push(Err(failure(&product.id, &err))),
                    }
                }
            }
            Ok(vectors) => {
                let err = KioskError::embedding(format!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    valid.len()
                ));
                warn!("{err}");
                results.extend(valid.iter().map(|p| Err(failure(&p.id, &err))));
            }
            Err(err) => {
                warn!("embedding batch of {} failed: {err}", valid.len());
                results.extend(valid.iter().map(|p| Err(failure(&p.id, &err))));
            }
        }
        results
    }

    async fn write_product(
        &self,
        product: Product,
        vector: Vec<f32>,
    ) -> std::result::Result<(), IngestFailure> {
        let id = product.id.clone();
        let record = product.embedding_record(vector);
        let document = product.keyword_document();
        let name = product.name.clone();

        let mut stored = 0;
        let written = async {
            self.catalog.insert(vec![product]).await?;
            stored += 1;
            self.vector_index.upsert(vec![record]).await?;
            stored += 1;
            self.keyword_index.upsert(vec![document]).await
        }
        .await;

        match written {
            Ok(()) => {
                debug!("product {name} ({id}) seeded");
                Ok(())
            }
            Err(err) => {
                warn!("failed to seed product {id}: {err}");
                self.roll_back(&id, stored).await;
                Err(failure(&id, &err))
            }
        }
    }

    /// Remove a half-written product. `stored` counts the writes that
    /// succeeded: catalog, then vector index. The indexes are cleared before
    /// the catalog, and the catalog row stays if they cannot be.
    async fn roll_back(&self, id: &str, stored: usize) {
        let ids = [id.to_string()];
        if stored >= 2 {
            let indexes = async {
                self.keyword_index.delete(&ids).await?;
                self.vector_index.delete(&ids).await
            }
            .await;
            if let Err(err) = indexes {
                error!("failed to roll back index entries for product {id}: {err}");
                return;
            }
        }
        if stored >= 1 {
            if let Err(err) = self.catalog.delete(&ids).await {
                error!("failed to roll back catalog entry for product {id}: {err}");
                return;
            }
        }
        debug!("rolled back product {id}");
    }
}

fn failure(id: &str, err: &KioskError) -> IngestFailure {
    IngestFailure {
        id: id.to_string(),
        message: err.to_string(),
    }
}
