//! Text embedding support for vector search.
//!
//! Embedders turn text into fixed-length dense vectors. The search engine only
//! sees the [`TextEmbedder`] trait, so the provider is chosen by whoever
//! assembles the retriever:
//!
//! - [`OpenAITextEmbedder`] calls an OpenAI-compatible HTTP endpoint.
//! - [`HashingEmbedder`] is a deterministic local embedder for offline use.
//!
//! # Dynamic Switching
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kiosk::embedding::{
//!     HashingEmbedder, OpenAIEmbedderConfig, OpenAITextEmbedder, TextEmbedder,
//! };
//!
//! # fn example() -> kiosk::error::Result<()> {
//! let embedder: Arc<dyn TextEmbedder> = match std::env::var("OPENAI_API_KEY") {
//!     Ok(api_key) => Arc::new(OpenAITextEmbedder::new(OpenAIEmbedderConfig {
//!         api_key,
//!         ..Default::default()
//!     })?),
//!     Err(_) => Arc::new(HashingEmbedder::new(384)?),
//! };
//! assert_eq!(embedder.dimension(), 384);
//! # Ok(())
//! # }
//! ```

pub mod hashing_embedder;
pub mod openai_text_embedder;
pub mod text_embedder;

pub use hashing_embedder::HashingEmbedder;
pub use openai_text_embedder::{DEFAULT_OPENAI_BASE_URL, OpenAIEmbedderConfig, OpenAITextEmbedder};
pub use text_embedder::{TextEmbedder, check_dimension};
