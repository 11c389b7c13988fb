//! Keyword index backed by Postgres full-text search.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{KioskError, Result, SearchStage};
use crate::keyword_index::KeywordIndex;
use crate::keyword_index::tokenizer::and_query;
use crate::product::{KeywordDocument, ScoredId};
use crate::supabase::client::{SupabaseClient, in_filter};

#[derive(Debug, Serialize)]
struct KeywordRequest<'a> {
    query_text: &'a str,
    match_count: usize,
}

#[derive(Debug, Deserialize)]
struct KeywordRow {
    id: String,
    #[serde(alias = "similarity")]
    rank: f32,
}

#[derive(Debug, Serialize)]
struct FtsColumn<'a> {
    fts_text: Option<&'a str>,
}

/// [`KeywordIndex`] over the `fts_text` column of the embedding table.
///
/// Query tokens are joined with `&` before they reach the RPC, so a row
/// matches only if it contains every token.
#[derive(Debug, Clone)]
pub struct SupabaseKeywordIndex {
    client: SupabaseClient,
    table: String,
    rpc: String,
}

impl SupabaseKeywordIndex {
    pub fn new(client: SupabaseClient, table: impl Into<String>, rpc: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
            rpc: rpc.into(),
        }
    }
}

#[async_trait]
impl KeywordIndex for SupabaseKeywordIndex {
    async fn query_keyword(&self, text: &str, k: usize) -> Result<Vec<ScoredId>> {
        let query_text = and_query(text);
        if query_text.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let request = KeywordRequest {
            query_text: &query_text,
            match_count: k,
        };
        let rows: Vec<KeywordRow> = self
            .client
            .rpc(SearchStage::KeywordIndex, &self.rpc, &request)
            .await?;
        Ok(rows
            .into_iter()
            .take(k)
            .map(|row| ScoredId::new(row.id, row.rank))
            .collect())
    }

    /// Writes each document's text into the row the vector index created for
    /// the same id. Fails if that row does not exist.
    async fn upsert(&self, documents: Vec<KeywordDocument>) -> Result<()> {
        for doc in &documents {
            let filter = [("id", format!("eq.{}", doc.id))];
            let body = FtsColumn {
                fts_text: Some(&doc.text),
            };
            let updated = self
                .client
                .update_returning_ids(SearchStage::KeywordIndex, &self.table, &filter, &body)
                .await?;
            if updated.is_empty() {
                return Err(KioskError::index(
                    SearchStage::KeywordIndex,
                    format!("{}: no row with id {:?} to index", self.table, doc.id),
                ));
            }
        }
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let filter = [("id", in_filter(ids))];
        self.client
            .update(
                SearchStage::KeywordIndex,
                &self.table,
                &filter,
                &FtsColumn { fts_text: None },
            )
            .await
    }

    async fn delete_all(&self) -> Result<()> {
        let filter = [("id", "not.is.null".to_string())];
        self.client
            .update(
                SearchStage::KeywordIndex,
                &self.table,
                &filter,
                &FtsColumn { fts_text: None },
            )
            .await
    }
}
