//! Deployment configuration.
//!
//! [`KioskConfig`] gathers everything a deployment chooses: the embedding
//! provider, the storage backend, retrieval tuning and ingestion tuning. It
//! is assembled by the CLI from flags and environment variables, checked
//! with [`KioskConfig::validate`], and then turned into live components with
//! [`KioskConfig::build`].
//!
//! # Examples
//!
//! ```
//! use kiosk::config::{EmbeddingConfig, KioskConfig, StoreConfig};
//!
//! # tokio_test::block_on(async {
//! let config = KioskConfig {
//!     embedding: EmbeddingConfig::Hashing { dimension: 64 },
//!     store: StoreConfig::memory(),
//!     ..Default::default()
//! };
//! config.validate().unwrap();
//!
//! let services = config.build().await.unwrap();
//! assert!(services.retriever.search("anything").await.unwrap().is_empty());
//! # });
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::catalog::{MemoryCatalog, ProductStore};
use crate::embedding::{HashingEmbedder, OpenAIEmbedderConfig, OpenAITextEmbedder, TextEmbedder};
use crate::error::{KioskError, Result};
use crate::hybrid::{HybridRetriever, HybridSearchConfig};
use crate::ingest::{IngestConfig, IngestPipeline, load_seed_file};
use crate::keyword_index::{InvertedKeywordIndex, KeywordIndex};
use crate::supabase::{
    SupabaseClient, SupabaseConfig, SupabaseKeywordIndex, SupabaseProductStore,
    SupabaseVectorIndex,
};
use crate::vector_index::{DistanceMetric, FlatIndexConfig, FlatVectorIndex, VectorIndex};

/// Embedding provider selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum EmbeddingConfig {
    /// OpenAI-compatible embeddings API.
    #[serde(rename = "openai")]
    OpenAi(OpenAIEmbedderConfig),
    /// Local feature-hashing embedder.
    Hashing { dimension: usize },
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig::OpenAi(OpenAIEmbedderConfig::default())
    }
}

impl EmbeddingConfig {
    /// Dimension of every vector the configured provider produces.
    pub fn dimension(&self) -> usize {
        match self {
            EmbeddingConfig::OpenAi(config) => config
                .dimensions
                .unwrap_or_else(|| OpenAITextEmbedder::default_dimension(&config.model)),
            EmbeddingConfig::Hashing { dimension } => *dimension,
        }
    }

    pub fn build(&self) -> Result<Arc<dyn TextEmbedder>> {
        let embedder: Arc<dyn TextEmbedder> = match self {
            EmbeddingConfig::OpenAi(config) => Arc::new(OpenAITextEmbedder::new(config.clone())?),
            EmbeddingConfig::Hashing { dimension } => Arc::new(HashingEmbedder::new(*dimension)?),
        };
        Ok(embedder)
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Process-local stores, optionally seeded from a file at startup.
    Memory {
        seed_file: Option<PathBuf>,
        metric: DistanceMetric,
    },
    /// Supabase PostgREST tables and RPCs.
    Supabase(SupabaseConfig),
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::memory()
    }
}

impl StoreConfig {
    /// Empty in-memory stores ranked by cosine similarity.
    pub fn memory() -> Self {
        StoreConfig::Memory {
            seed_file: None,
            metric: DistanceMetric::Cosine,
        }
    }
}

/// Full deployment configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    pub search: HybridSearchConfig,
    pub ingest: IngestConfig,
}

/// The three stores the retriever reads and the pipeline writes.
#[derive(Clone)]
pub struct Stores {
    pub vector_index: Arc<dyn VectorIndex>,
    pub keyword_index: Arc<dyn KeywordIndex>,
    pub catalog: Arc<dyn ProductStore>,
}

/// Live components built from a [`KioskConfig`].
#[derive(Clone)]
pub struct Services {
    pub retriever: Arc<HybridRetriever>,
    pub pipeline: Arc<IngestPipeline>,
    pub stores: Stores,
}

impl KioskConfig {
    /// Reject configurations that cannot start.
    pub fn validate(&self) -> Result<()> {
        match &self.embedding {
            EmbeddingConfig::OpenAi(config) => {
                if config.api_key.trim().is_empty() {
                    return Err(KioskError::config(
                        "missing OpenAI API key (set OPENAI_API_KEY)",
                    ));
                }
                if config.model.trim().is_empty() {
                    return Err(KioskError::config("missing embedding model name"));
                }
                let budget = config.retry_budget();
                if self.search.call_timeout <= budget {
                    return Err(KioskError::config(format!(
                        "search timeout of {} ms leaves no room for embedding retries \
                         (up to {} ms with {} retries of {} ms each)",
                        self.search.call_timeout.as_millis(),
                        budget.as_millis(),
                        config.max_retries,
                        config.timeout.as_millis()
                    )));
                }
            }
            EmbeddingConfig::Hashing { .. } => {}
        }
        if self.embedding.dimension() == 0 {
            return Err(KioskError::config("embedding dimensions must be positive"));
        }
        if let StoreConfig::Supabase(config) = &self.store {
            config.validate()?;
        }
        self.search.validate()?;
        self.ingest.validate()
    }

    /// Build the stores for the configured backend.
    pub fn build_stores(&self) -> Result<Stores> {
        let dimension = self.embedding.dimension();
        Ok(match &self.store {
            StoreConfig::Memory { metric, .. } => Stores {
                vector_index: Arc::new(FlatVectorIndex::new(FlatIndexConfig {
                    dimension,
                    metric: *metric,
                })),
                keyword_index: Arc::new(InvertedKeywordIndex::default()),
                catalog: Arc::new(MemoryCatalog::new()),
            },
            StoreConfig::Supabase(config) => {
                let client = SupabaseClient::new(config)?;
                Stores {
                    vector_index: Arc::new(SupabaseVectorIndex::new(
                        client.clone(),
                        &config.vector_table,
                        &config.similarity_query,
                        dimension,
                    )),
                    keyword_index: Arc::new(SupabaseKeywordIndex::new(
                        client.clone(),
                        &config.vector_table,
                        &config.keyword_query,
                    )),
                    catalog: Arc::new(SupabaseProductStore::new(client, &config.product_table)),
                }
            }
        })
    }

    /// Build every component. In-memory stores with a seed file are seeded
    /// before this returns.
    pub async fn build(&self) -> Result<Services> {
        self.validate()?;
        let embedder = self.embedding.build()?;
        let stores = self.build_stores()?;

        let retriever = HybridRetriever::new(
            embedder.clone(),
            stores.vector_index.clone(),
            stores.keyword_index.clone(),
            stores.catalog.clone(),
            self.search.clone(),
        )?;
        let pipeline = IngestPipeline::new(
            embedder,
            stores.vector_index.clone(),
            stores.keyword_index.clone(),
            stores.catalog.clone(),
            self.ingest.clone(),
        )?;

        if let StoreConfig::Memory {
            seed_file: Some(path),
            ..
        } = &self.store
        {
            let seeds = load_seed_file(path)?;
            let report = pipeline.reseed_from_seeds(&seeds).await?;
            if report.is_success() {
                info!("seeded {} products from {}", report.succeeded, path.display());
            } else {
                warn!(
                    "seeded {} of {} products from {}",
                    report.succeeded,
                    report.total,
                    path.display()
                );
            }
        }

        Ok(Services {
            retriever: Arc::new(retriever),
            pipeline: Arc::new(pipeline),
            stores,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use super::*;

    fn hashing() -> KioskConfig {
        KioskConfig {
            embedding: EmbeddingConfig::Hashing { dimension: 256 },
            ..Default::default()
        }
    }

    #[test]
    fn test_default_is_openai_with_384_dimensions() {
        let config = KioskConfig::default();
        assert_eq!(config.embedding.dimension(), 384);
        match &config.embedding {
            EmbeddingConfig::OpenAi(openai) => assert_eq!(openai.model, "text-embedding-3-large"),
            other => panic!("unexpected default {other:?}"),
        }
        assert_eq!(config.search.k_vector, 3);
        // No key configured.
        assert!(matches!(config.validate(), Err(KioskError::Config(_))));
    }

    #[test]
    fn test_search_timeout_must_cover_embedding_retries() {
        let openai = OpenAIEmbedderConfig {
            api_key: "sk-test".to_string(),
            ..Default::default()
        };
        let mut config = KioskConfig {
            embedding: EmbeddingConfig::OpenAi(openai.clone()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.search.call_timeout = openai.timeout;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, KioskError::Config(_)));
        assert!(err.to_string().contains("retries"));

        config.search.call_timeout = openai.retry_budget();
        assert!(config.validate().is_err());

        config.search.call_timeout = openai.retry_budget() + Duration::from_millis(1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_native_dimension_when_unset() {
        let config = EmbeddingConfig::OpenAi(OpenAIEmbedderConfig {
            dimensions: None,
            ..Default::default()
        });
        assert_eq!(config.dimension(), 3072);
    }

    #[test]
    fn test_validate_checks_every_section() {
        assert!(hashing().validate().is_ok());

        let mut config = hashing();
        config.embedding = EmbeddingConfig::Hashing { dimension: 0 };
        assert!(config.validate().is_err());

        let mut config = hashing();
        config.search.limit = 0;
        assert!(config.validate().is_err());

        let mut config = hashing();
        config.store = StoreConfig::Supabase(SupabaseConfig::default());
        assert!(config.validate().is_err());

        let mut config = hashing();
        config.ingest.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_build_seeds_memory_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"imageId": "dark_down_jacket_1.png", "description": "warm winter coat"}},
                {{"imageId": "red_sneakers.png", "description": "running shoes"}}
            ]"#
        )
        .unwrap();

        let mut config = hashing();
        config.store = StoreConfig::Memory {
            seed_file: Some(file.path().to_path_buf()),
            metric: DistanceMetric::Cosine,
        };
        let services = config.build().await.unwrap();
        assert_eq!(services.stores.catalog.count().await.unwrap(), 2);

        let products = services.retriever.search("warm coat").await.unwrap();
        assert_eq!(products[0].name, "Dark Down Jacket 1");
    }

    #[tokio::test]
    async fn test_build_fails_on_missing_seed_file() {
        let mut config = hashing();
        config.store = StoreConfig::Memory {
            seed_file: Some(PathBuf::from("/nonexistent/kiosk-seed.json")),
            metric: DistanceMetric::Cosine,
        };
        assert!(matches!(config.build().await, Err(KioskError::Io(_))));
    }

    #[test]
    fn test_serde_shape() {
        let config: KioskConfig = serde_json::from_str(
            r#"{"embedding": {"provider": "hashing", "dimension": 8},
                "store": {"backend": "memory", "seed_file": null, "metric": "dot_product"}}"#,
        )
        .unwrap();
        assert_eq!(config.embedding.dimension(), 8);
        assert!(matches!(
            config.store,
            StoreConfig::Memory {
                metric: DistanceMetric::DotProduct,
                ..
            }
        ));
    }
}
