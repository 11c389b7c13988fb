//! Vector index backed by a pgvector table and a similarity RPC.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::check_dimension;
use crate::error::{Result, SearchStage};
use crate::product::{EmbeddingRecord, Product, ScoredId};
use crate::supabase::client::SupabaseClient;
use crate::vector_index::{DistanceMetric, VectorIndex};

#[derive(Debug, Serialize)]
struct MatchRequest<'a> {
    query_embedding: &'a [f32],
    match_count: usize,
}

#[derive(Debug, Deserialize)]
struct MatchRow {
    id: String,
    similarity: f32,
}

#[derive(Debug, Serialize)]
struct EmbeddingRow<'a> {
    id: &'a str,
    content: &'a str,
    metadata: &'a Product,
    embedding: &'a [f32],
}

/// [`VectorIndex`] over the `product_embedding` table.
///
/// The similarity RPC is expected to return rows `{id, similarity}` ordered by
/// descending similarity; the order is kept as returned.
#[derive(Debug, Clone)]
pub struct SupabaseVectorIndex {
    client: SupabaseClient,
    table: String,
    rpc: String,
    dimension: usize,
    metric: DistanceMetric,
}

impl SupabaseVectorIndex {
    pub fn new(
        client: SupabaseClient,
        table: impl Into<String>,
        rpc: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            client,
            table: table.into(),
            rpc: rpc.into(),
            dimension,
            metric: DistanceMetric::Cosine,
        }
    }

    /// Set the metric the RPC ranks by. Informational only.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }
}

#[async_trait]
impl VectorIndex for SupabaseVectorIndex {
    async fn query_similar(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredId>> {
        check_dimension(self.dimension, vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let request = MatchRequest {
            query_embedding: vector,
            match_count: k,
        };
        let rows: Vec<MatchRow> = self
            .client
            .rpc(SearchStage::VectorIndex, &self.rpc, &request)
            .await?;
        Ok(rows
            .into_iter()
            .take(k)
            .map(|row| ScoredId::new(row.id, row.similarity))
            .collect())
    }

    async fn upsert(&self, records: Vec<EmbeddingRecord>) -> Result<()> {
        for record in &records {
            check_dimension(self.dimension, &record.vector)?;
        }
        let rows: Vec<EmbeddingRow<'_>> = records
            .iter()
            .map(|record| EmbeddingRow {
                id: &record.id,
                content: &record.text,
                metadata: &record.metadata,
                embedding: &record.vector,
            })
            .collect();
        self.client
            .upsert(SearchStage::VectorIndex, &self.table, &rows)
            .await
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        self.client
            .delete_ids(SearchStage::VectorIndex, &self.table, ids)
            .await
    }

    async fn delete_all(&self) -> Result<()> {
        self.client
            .delete_all(SearchStage::VectorIndex, &self.table)
            .await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }
}
