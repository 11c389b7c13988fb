//! Hybrid retriever.
//!
//! The retriever owns no storage. It receives its embedder, both indexes and
//! the product store at construction and only orchestrates them:
//!
//! ```text
//! query ─► validate ─┬─► embed ─► vector index ─┐
//!                    └─► keyword index ─────────┴─► fuse ─► product join
//! ```
//!
//! The keyword lookup does not wait for the embedding call. Every external
//! call runs under the configured timeout, and any failure fails the whole
//! search; a ranking built from one signal is never returned in place of the
//! hybrid one.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error};
use serde_json::Value;

use crate::catalog::ProductStore;
use crate::embedding::{TextEmbedder, check_dimension};
use crate::error::{KioskError, Result, SearchStage};
use crate::hybrid::config::HybridSearchConfig;
use crate::hybrid::search::merger::{FusedHit, ResultMerger};
use crate::keyword_index::KeywordIndex;
use crate::product::{Product, ScoredId, SearchResult};
use crate::validation::QueryValidator;
use crate::vector_index::VectorIndex;

/// Hybrid retriever over injected collaborators.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use kiosk::catalog::{MemoryCatalog, ProductStore};
/// use kiosk::embedding::{HashingEmbedder, TextEmbedder};
/// use kiosk::hybrid::{HybridRetriever, HybridSearchConfig};
/// use kiosk::keyword_index::{InvertedKeywordIndex, KeywordIndex};
/// use kiosk::product::Product;
/// use kiosk::vector_index::{FlatIndexConfig, FlatVectorIndex, VectorIndex};
///
/// # tokio_test::block_on(async {
/// let embedder = Arc::new(HashingEmbedder::new(64).unwrap());
/// let vectors = Arc::new(FlatVectorIndex::new(FlatIndexConfig {
///     dimension: 64,
///     ..Default::default()
/// }));
/// let keywords = Arc::new(InvertedKeywordIndex::default());
/// let catalog = Arc::new(MemoryCatalog::new());
///
/// let jacket = Product::new("a", "Dark Down Jacket", "warm winter coat", 129.0, "a.png");
/// let vector = embedder.embed(&jacket.search_text()).await.unwrap();
/// vectors.upsert(vec![jacket.embedding_record(vector)]).await.unwrap();
/// keywords.upsert(vec![jacket.keyword_document()]).await.unwrap();
/// catalog.insert(vec![jacket]).await.unwrap();
///
/// let retriever = HybridRetriever::new(
///     embedder,
///     vectors,
///     keywords,
///     catalog,
///     HybridSearchConfig::default(),
/// )
/// .unwrap();
/// let products = retriever.search("warm coat").await.unwrap();
/// assert_eq!(products[0].id, "a");
/// # });
/// ```
pub struct HybridRetriever {
    embedder: Arc<dyn TextEmbedder>,
    vector_index: Arc<dyn VectorIndex>,
    keyword_index: Arc<dyn KeywordIndex>,
    catalog: Arc<dyn ProductStore>,
    validator: QueryValidator,
    merger: ResultMerger,
    config: HybridSearchConfig,
}

impl HybridRetriever {
    /// Assemble a retriever.
    ///
    /// Fails if the configuration is invalid or if the embedder and the
    /// vector index disagree on dimensionality.
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        vector_index: Arc<dyn VectorIndex>,
        keyword_index: Arc<dyn KeywordIndex>,
        catalog: Arc<dyn ProductStore>,
        config: HybridSearchConfig,
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
            validator: QueryValidator::new(),
            merger: ResultMerger::new(&config),
            config,
        })
    }

    pub fn config(&self) -> &HybridSearchConfig {
        &self.config
    }

    /// Validate an untyped query value, then search.
    pub async fn search_value(&self, raw: Option<&Value>) -> Result<Vec<Product>> {
        let query = self.validator.validate(raw)?;
        self.search(&query).await
    }

    /// Return the ranked products for `query`.
    pub async fn search(&self, query: &str) -> Result<Vec<Product>> {
        Ok(self
            .search_scored(query)
            .await?
            .into_iter()
            .map(|result| result.product)
            .collect())
    }

    /// Return the ranked products for `query` together with their fused scores.
    pub async fn search_scored(&self, query: &str) -> Result<Vec<SearchResult>> {
        let query = self.validator.validate_str(Some(query))?;
        let started = Instant::now();

        let (vector_hits, keyword_hits) =
            tokio::try_join!(self.vector_branch(&query), self.keyword_branch(&query))?;

        let fused = self.merger.fuse(&vector_hits, &keyword_hits);
        let results = self.join_products(fused).await?;

        debug!(
            "hybrid search for {:?}: {} vector hits, {} keyword hits, {} results in {:?}",
            query,
            vector_hits.len(),
            keyword_hits.len(),
            results.len(),
            started.elapsed()
        );
        Ok(results)
    }

    async fn vector_branch(&self, query: &str) -> Result<Vec<ScoredId>> {
        let started = Instant::now();
        let vector = self
            .call(SearchStage::Embed, self.embedder.embed(query))
            .await?;
        check_dimension(self.vector_index.dimension(), &vector)?;
        debug!("embedded query with {} in {:?}", self.embedder.name(), started.elapsed());

        let started = Instant::now();
        let hits = self
            .call(
                SearchStage::VectorIndex,
                self.vector_index.query_similar(&vector, self.config.k_vector),
            )
            .await?;
        debug!("vector lookup took {:?}", started.elapsed());
        Ok(hits)
    }

    async fn keyword_branch(&self, query: &str) -> Result<Vec<ScoredId>> {
        if self.config.k_keyword == 0 {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        let hits = self
            .call(
                SearchStage::KeywordIndex,
                self.keyword_index.query_keyword(query, self.config.k_keyword),
            )
            .await?;
        debug!("keyword lookup took {:?}", started.elapsed());
        Ok(hits)
    }

    async fn join_products(&self, fused: Vec<FusedHit>) -> Result<Vec<SearchResult>> {
        if fused.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = fused.iter().map(|hit| hit.id.clone()).collect();
        let products = self
            .call(SearchStage::Fusion, self.catalog.get_many(&ids))
            .await?;
        if products.len() != fused.len() {
            return Err(KioskError::index(
                SearchStage::Fusion,
                format!(
                    "product store returned {} slots for {} ids",
                    products.len(),
                    fused.len()
                ),
            ));
        }

        fused
            .into_iter()
            .zip(products)
            .map(|(hit, product)| match product {
                Some(product) => Ok(SearchResult {
                    product,
                    score: hit.fused_score,
                }),
                None => {
                    error!(
                        "index returned product {} which is missing from the catalog",
                        hit.id
                    );
                    Err(KioskError::fusion(hit.id))
                }
            })
            .collect()
    }

    /// Run one external call under the per-call timeout, attributing failures to `stage`.
    async fn call<T, F>(&self, stage: SearchStage, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timeout = self.config.call_timeout;
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result.map_err(|err| attribute(stage, err)),
            Err(_) => Err(KioskError::timeout(stage, timeout.as_millis() as u64)),
        }
    }
}

/// Tag errors that carry no stage of their own with the stage that raised them.
fn attribute(stage: SearchStage, err: KioskError) -> KioskError {
    if err.stage() != SearchStage::Other {
        return err;
    }
    match stage {
        SearchStage::Embed => KioskError::embedding(err.to_string()),
        SearchStage::Other | SearchStage::Validate => err,
        stage => KioskError::index(stage, err.to_string()),
    }
}
