//! Exact (brute-force) in-memory vector index.

use ahash::AHashMap;
use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::embedding::check_dimension;
use crate::error::Result;
use crate::product::{EmbeddingRecord, Product, ScoredId, descending_score};
use crate::vector_index::{DistanceMetric, VectorIndex};

/// Configuration for [`FlatVectorIndex`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndexConfig {
    pub dimension: usize,
    pub metric: DistanceMetric,
}

impl Default for FlatIndexConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            metric: DistanceMetric::Cosine,
        }
    }
}

#[derive(Debug, Default)]
struct Entries {
    /// Records in insertion order.
    records: Vec<EmbeddingRecord>,
    positions: AHashMap<String, usize>,
}

/// Flat vector index that scores every stored vector on each query.
///
/// Replacing an existing id keeps its original insertion position, which is
/// what ties are broken by.
#[derive(Debug)]
pub struct FlatVectorIndex {
    config: FlatIndexConfig,
    entries: RwLock<Entries>,
}

impl FlatVectorIndex {
    /// Create a new empty index.
    pub fn new(config: FlatIndexConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(Entries::default()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.entries.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Product snapshot stored alongside a vector.
    pub fn metadata(&self, id: &str) -> Option<Product> {
        let entries = self.entries.read();
        entries
            .positions
            .get(id)
            .map(|&pos| entries.records[pos].metadata.clone())
    }

    fn rank(&self, query: &[f32], k: usize) -> Result<Vec<ScoredId>> {
        let entries = self.entries.read();
        let vectors: Vec<&[f32]> = entries
            .records
            .iter()
            .map(|record| record.vector.as_slice())
            .collect();
        let scores = self.config.metric.batch_similarity(query, &vectors)?;

        let mut ranked: Vec<(usize, f32)> = scores.into_iter().enumerate().collect();
        // Stable sort: equal scores stay in insertion order.
        ranked.sort_by(|a, b| descending_score(a.1, b.1));
        ranked.truncate(k);

        Ok(ranked
            .into_iter()
            .map(|(pos, score)| ScoredId::new(entries.records[pos].id.clone(), score))
            .collect())
    }
}

#[async_trait]
impl VectorIndex for FlatVectorIndex {
    async fn query_similar(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredId>> {
        check_dimension(self.config.dimension, vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let hits = self.rank(vector, k)?;
        debug!("flat vector index returned {} of top {}", hits.len(), k);
        Ok(hits)
    }

    async fn upsert(&self, records: Vec<EmbeddingRecord>) -> Result<()> {
        for record in &records {
            check_dimension(self.config.dimension, &record.vector)?;
        }

        let mut guard = self.entries.write();
        let entries = &mut *guard;
        for record in records {
            let existing = entries.positions.get(&record.id).copied();
            match existing {
                Some(pos) => entries.records[pos] = record,
                None => {
                    let pos = entries.records.len();
                    entries.positions.insert(record.id.clone(), pos);
                    entries.records.push(record);
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut guard = self.entries.write();
        let entries = &mut *guard;
        let before = entries.records.len();
        entries.records.retain(|record| !ids.contains(&record.id));
        if entries.records.len() != before {
            entries.positions = entries
                .records
                .iter()
                .enumerate()
                .map(|(pos, record)| (record.id.clone(), pos))
                .collect();
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        let mut entries = self.entries.write();
        entries.records.clear();
        entries.positions.clear();
        Ok(())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.config.metric
    }
}
