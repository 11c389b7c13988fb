//! Hybrid search combining keyword and vector retrieval.
//!
//! - [`config`]: weights, candidate counts, normalization and timeouts
//! - [`search::scorer`]: per-index score normalization
//! - [`search::merger`]: union, weighted fusion and deterministic ranking
//! - [`search::retriever`]: the concurrent query pipeline
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kiosk::catalog::ProductStore;
//! use kiosk::embedding::TextEmbedder;
//! use kiosk::error::Result;
//! use kiosk::hybrid::{HybridRetriever, HybridSearchConfig};
//! use kiosk::keyword_index::KeywordIndex;
//! use kiosk::vector_index::VectorIndex;
//!
//! async fn example(
//!     embedder: Arc<dyn TextEmbedder>,
//!     vectors: Arc<dyn VectorIndex>,
//!     keywords: Arc<dyn KeywordIndex>,
//!     catalog: Arc<dyn ProductStore>,
//! ) -> Result<()> {
//!     let mut config = HybridSearchConfig::default();
//!     config.keyword_weight = 0.5;
//!     config.vector_weight = 0.5;
//!
//!     let retriever = HybridRetriever::new(embedder, vectors, keywords, catalog, config)?;
//!     for product in retriever.search("warm coat").await? {
//!         println!("{} ({:.2})", product.name, product.price);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod search;

pub use config::{FusionMode, HybridSearchConfig, ScoreNormalization};
pub use search::merger::{FusedHit, ResultMerger};
pub use search::retriever::HybridRetriever;
pub use search::scorer::ScoreNormalizer;
