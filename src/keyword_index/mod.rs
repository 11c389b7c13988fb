//! Lexical keyword index.
//!
//! Queries are tokenized with [`tokenizer::tokenize`] and, by default, a
//! document matches only if it contains every query token
//! ([`MatchMode::All`]). This trades recall for precision: a product missing
//! any word of the query is left to the vector side of hybrid search.

pub mod bm25;
pub mod inverted;
pub mod tokenizer;

pub use bm25::{Bm25Config, Bm25Scorer};
pub use inverted::{InvertedIndexConfig, InvertedKeywordIndex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::product::{KeywordDocument, ScoredId};

/// How query tokens are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Every token must be present.
    #[default]
    All,
    /// At least one token must be present.
    Any,
}

/// Storage contract for the lexical side of hybrid search.
#[async_trait]
pub trait KeywordIndex: Send + Sync {
    /// Return at most `k` ids ordered by descending relevance to `text`.
    async fn query_keyword(&self, text: &str, k: usize) -> Result<Vec<ScoredId>>;

    /// Insert or replace documents by id.
    async fn upsert(&self, documents: Vec<KeywordDocument>) -> Result<()>;

    /// Remove the documents with the given ids. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<()>;

    /// Remove every document, ahead of a full reseed.
    async fn delete_all(&self) -> Result<()>;
}
