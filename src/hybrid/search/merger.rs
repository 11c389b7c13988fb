//! Result merging for hybrid search.
//!
//! [`ResultMerger`] unions the vector and keyword hit lists, normalizes each
//! list's scores independently and ranks candidates by the weighted sum.

use std::cmp::Ordering;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::hybrid::config::{FusionMode, HybridSearchConfig};
use crate::hybrid::search::scorer::ScoreNormalizer;
use crate::product::{ScoredId, descending_score};

/// A candidate after fusion, before it is joined with its product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedHit {
    pub id: String,
    /// Normalized vector similarity, if the vector index returned this id.
    pub vector_score: Option<f32>,
    /// Normalized keyword relevance, if the keyword index returned this id.
    pub keyword_score: Option<f32>,
    pub fused_score: f32,
}

/// Result merger for combining vector and keyword hits.
#[derive(Debug, Clone)]
pub struct ResultMerger {
    vector_weight: f32,
    keyword_weight: f32,
    fusion: FusionMode,
    limit: usize,
    normalizer: ScoreNormalizer,
}

impl ResultMerger {
    /// Create a merger from the hybrid search configuration.
    pub fn new(config: &HybridSearchConfig) -> Self {
        Self {
            vector_weight: config.vector_weight,
            keyword_weight: config.keyword_weight,
            fusion: config.fusion,
            limit: config.limit,
            normalizer: ScoreNormalizer::new(config.normalization),
        }
    }

    /// Fuse the two hit lists into at most `limit` ranked candidates.
    ///
    /// The output is sorted by descending fused score, then ascending id, so
    /// identical inputs always produce identical rankings. A candidate that
    /// only one index returned contributes 0.0 for the other signal.
    ///
    /// # Examples
    ///
    /// ```
    /// use kiosk::hybrid::config::HybridSearchConfig;
    /// use kiosk::hybrid::search::merger::ResultMerger;
    /// use kiosk::product::ScoredId;
    ///
    /// let merger = ResultMerger::new(&HybridSearchConfig::default());
    /// let vector = vec![ScoredId::new("jacket", 0.82), ScoredId::new("sneakers", 0.41)];
    /// let keyword = vec![ScoredId::new("jacket", 3.1)];
    ///
    /// let fused = merger.fuse(&vector, &keyword);
    /// assert_eq!(fused[0].id, "jacket");
    /// assert_eq!(fused[1].id, "sneakers");
    /// ```
    pub fn fuse(&self, vector_hits: &[ScoredId], keyword_hits: &[ScoredId]) -> Vec<FusedHit> {
        let vector_hits = dedup(vector_hits);
        let keyword_hits = dedup(keyword_hits);
        let vector_scores = self.normalizer.normalize(&vector_hits);
        let keyword_scores = self.normalizer.normalize(&keyword_hits);

        let mut merged: AHashMap<String, FusedHit> = AHashMap::new();
        for (hit, score) in vector_hits.iter().zip(vector_scores) {
            merged.insert(
                hit.id.clone(),
                FusedHit {
                    id: hit.id.clone(),
                    vector_score: Some(score),
                    keyword_score: None,
                    fused_score: 0.0,
                },
            );
        }
        for (hit, score) in keyword_hits.iter().zip(keyword_scores) {
            match merged.get_mut(&hit.id) {
                Some(existing) => existing.keyword_score = Some(score),
                None if self.fusion == FusionMode::Weighted => {
                    merged.insert(
                        hit.id.clone(),
                        FusedHit {
                            id: hit.id.clone(),
                            vector_score: None,
                            keyword_score: Some(score),
                            fused_score: 0.0,
                        },
                    );
                }
                None => {}
            }
        }

        let mut fused: Vec<FusedHit> = merged
            .into_values()
            .map(|mut hit| {
                hit.fused_score = self.combine(&hit);
                hit
            })
            .collect();
        fused.sort_by(compare_fused);
        fused.truncate(self.limit);
        fused
    }

    fn combine(&self, hit: &FusedHit) -> f32 {
        let vector = hit.vector_score.unwrap_or(0.0);
        match self.fusion {
            FusionMode::Weighted => {
                vector * self.vector_weight + hit.keyword_score.unwrap_or(0.0) * self.keyword_weight
            }
            FusionMode::VectorOnly => vector,
        }
    }
}

/// Descending score, then ascending id.
fn compare_fused(a: &FusedHit, b: &FusedHit) -> Ordering {
    descending_score(a.fused_score, b.fused_score).then_with(|| a.id.cmp(&b.id))
}

/// Keep the first (best-ranked) occurrence of each id.
fn dedup(hits: &[ScoredId]) -> Vec<ScoredId> {
    let mut seen = ahash::AHashSet::with_capacity(hits.len());
    hits.iter()
        .filter(|hit| seen.insert(hit.id.as_str()))
        .cloned()
        .collect()
}
