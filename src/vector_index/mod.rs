//! Dense vector index.
//!
//! A [`VectorIndex`] stores one [`EmbeddingRecord`] per product and answers
//! top-k nearest-neighbor queries under the deployment's [`DistanceMetric`].
//! Results are ordered by descending similarity; equal scores keep insertion
//! order so that results are reproducible.

pub mod distance;
pub mod flat;

pub use distance::DistanceMetric;
pub use flat::{FlatIndexConfig, FlatVectorIndex};

use async_trait::async_trait;

use crate::error::Result;
use crate::product::{EmbeddingRecord, ScoredId};

/// Storage contract for the dense side of hybrid search.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return at most `k` ids ordered by descending similarity to `vector`.
    async fn query_similar(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredId>>;

    /// Insert or replace records by id.
    async fn upsert(&self, records: Vec<EmbeddingRecord>) -> Result<()>;

    /// Remove the records with the given ids. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<()>;

    /// Remove every record, ahead of a full reseed.
    async fn delete_all(&self) -> Result<()>;

    /// Dimension every stored and queried vector must have.
    fn dimension(&self) -> usize;

    /// Metric the index ranks by.
    fn metric(&self) -> DistanceMetric;
}
