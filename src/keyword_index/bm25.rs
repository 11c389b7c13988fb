//! BM25 relevance scoring.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Configuration for BM25 scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Config {
    /// Term frequency saturation.
    pub k1: f32,
    /// Document length normalization.
    pub b: f32,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Bm25Config { k1: 1.2, b: 0.75 }
    }
}

/// Corpus-wide statistics needed to score one document.
#[derive(Debug, Clone, Copy)]
pub struct CollectionStats {
    pub total_docs: usize,
    pub avg_doc_length: f32,
}

/// BM25 scorer.
#[derive(Debug, Clone, Default)]
pub struct Bm25Scorer {
    config: Bm25Config,
}

impl Bm25Scorer {
    pub fn new(config: Bm25Config) -> Self {
        Self { config }
    }

    /// Inverse document frequency, always positive.
    pub fn idf(&self, doc_freq: usize, stats: &CollectionStats) -> f32 {
        let n = stats.total_docs as f32;
        let df = doc_freq as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// Score a document for the given query terms.
    ///
    /// `doc_freqs` maps each query term to the number of documents containing it.
    pub fn score(
        &self,
        query_terms: &[String],
        term_freqs: &AHashMap<String, u32>,
        doc_length: usize,
        doc_freqs: &AHashMap<&str, usize>,
        stats: &CollectionStats,
    ) -> f32 {
        let avg_len = if stats.avg_doc_length > 0.0 {
            stats.avg_doc_length
        } else {
            1.0
        };
        let length_norm = 1.0 - self.config.b + self.config.b * (doc_length as f32 / avg_len);

        let mut total_score = 0.0;
        for term in query_terms {
            let tf = term_freqs.get(term).copied().unwrap_or(0) as f32;
            if tf == 0.0 {
                continue;
            }
            let df = doc_freqs.get(term.as_str()).copied().unwrap_or(1);
            let tf_component = (tf * (self.config.k1 + 1.0)) / (tf + self.config.k1 * length_norm);
            total_score += self.idf(df, stats) * tf_component;
        }
        total_score
    }
}
