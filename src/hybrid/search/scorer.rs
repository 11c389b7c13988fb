//! Score normalization for hybrid search.
//!
//! Vector similarities and keyword relevance live on unrelated scales, so each
//! index's hit list is normalized on its own before the two are combined.

use crate::hybrid::config::ScoreNormalization;
use crate::product::ScoredId;

/// Score normalizer for one index's hit list.
#[derive(Debug, Clone, Copy)]
pub struct ScoreNormalizer {
    strategy: ScoreNormalization,
}

impl ScoreNormalizer {
    /// Create a new score normalizer.
    ///
    /// # Examples
    ///
    /// ```
    /// use kiosk::hybrid::config::ScoreNormalization;
    /// use kiosk::hybrid::search::scorer::ScoreNormalizer;
    /// use kiosk::product::ScoredId;
    ///
    /// let normalizer = ScoreNormalizer::new(ScoreNormalization::MinMax);
    /// let hits = vec![ScoredId::new("a", 12.0), ScoredId::new("b", 2.0)];
    /// assert_eq!(normalizer.normalize(&hits), vec![1.0, 0.0]);
    /// ```
    pub fn new(strategy: ScoreNormalization) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> ScoreNormalization {
        self.strategy
    }

    /// Normalize the scores of `hits`, returning one value per hit in order.
    ///
    /// Non-finite raw scores are treated as 0.0.
    pub fn normalize(&self, hits: &[ScoredId]) -> Vec<f32> {
        let scores: Vec<f32> = hits
            .iter()
            .map(|hit| if hit.score.is_finite() { hit.score } else { 0.0 })
            .collect();

        match self.strategy {
            ScoreNormalization::None => scores,
            ScoreNormalization::MinMax => normalize_min_max(&scores),
            ScoreNormalization::Rank => normalize_rank(&scores),
        }
    }
}

/// Scales scores linearly using `(score - min) / (max - min)`.
///
/// When every score is equal the list carries no ordering information of its
/// own, and each entry gets full credit.
fn normalize_min_max(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let min = scores.iter().fold(f32::INFINITY, |a, &b| a.min(b));
    let max = scores.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let range = max - min;

    if range > 0.0 {
        scores.iter().map(|&s| (s - min) / range).collect()
    } else {
        vec![1.0; scores.len()]
    }
}

/// `(n - rank) / n` where rank counts strictly greater scores.
fn normalize_rank(scores: &[f32]) -> Vec<f32> {
    let n = scores.len() as f32;
    scores
        .iter()
        .map(|&score| {
            let rank = scores.iter().filter(|&&other| other > score).count() as f32;
            (n - rank) / n
        })
        .collect()
}
