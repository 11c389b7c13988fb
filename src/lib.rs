//! # Kiosk
//!
//! Hybrid product search: a free-text query is answered by combining dense
//! semantic similarity with lexical keyword matching and merging the two
//! signals into one deterministic ranking.
//!
//! ## Features
//!
//! - Query validation ahead of any external call
//! - Pluggable embedding providers (OpenAI-compatible API, local hashing)
//! - Vector and keyword indexes behind async traits, with in-memory and
//!   Supabase (PostgREST) implementations
//! - Concurrent retrieval with per-call timeouts and min-max score fusion
//! - Bounded-concurrency reseeding with per-product outcome reports
//! - An HTTP search API and a CLI

pub mod catalog;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod hybrid;
pub mod ingest;
pub mod keyword_index;
pub mod product;
pub mod server;
pub mod supabase;
pub mod validation;
pub mod vector_index;

pub mod prelude {
    pub use crate::catalog::{MemoryCatalog, ProductStore};
    pub use crate::embedding::TextEmbedder;
    pub use crate::error::{KioskError, Result, SearchStage};
    pub use crate::hybrid::{HybridRetriever, HybridSearchConfig};
    pub use crate::keyword_index::KeywordIndex;
    pub use crate::product::{Product, SearchResult};
    pub use crate::vector_index::VectorIndex;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
