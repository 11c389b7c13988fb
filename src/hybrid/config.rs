//! Configuration for hybrid search.
//!
//! # Examples
//!
//! ```
//! use kiosk::hybrid::config::{FusionMode, HybridSearchConfig, ScoreNormalization};
//!
//! let config = HybridSearchConfig::default();
//! assert_eq!(config.k_vector, 3);
//! assert_eq!(config.limit, 3);
//! assert_eq!(config.normalization, ScoreNormalization::MinMax);
//!
//! // Favor exact term matches.
//! let mut keyword_focused = HybridSearchConfig::default();
//! keyword_focused.keyword_weight = 0.8;
//! keyword_focused.vector_weight = 0.2;
//! assert!(keyword_focused.validate().is_ok());
//!
//! // Rank purely by vector similarity.
//! let mut passthrough = HybridSearchConfig::default();
//! passthrough.fusion = FusionMode::VectorOnly;
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KioskError, Result};

/// Configuration for the hybrid retriever.
///
/// Weights are applied after each index's scores have been normalized, so
/// they express relative importance independent of the raw score scales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridSearchConfig {
    /// Candidates fetched from the vector index.
    pub k_vector: usize,
    /// Candidates fetched from the keyword index.
    pub k_keyword: usize,
    /// Maximum number of products returned.
    pub limit: usize,
    /// Weight of the normalized vector similarity.
    pub vector_weight: f32,
    /// Weight of the normalized keyword relevance.
    pub keyword_weight: f32,
    /// Normalization applied to each index's scores independently.
    pub normalization: ScoreNormalization,
    /// How the two signals are merged.
    pub fusion: FusionMode,
    /// Time budget for each external call (embedding, each index, the catalog join).
    #[serde(with = "duration_millis")]
    pub call_timeout: Duration,
}

impl Default for HybridSearchConfig {
    fn default() -> Self {
        Self {
            k_vector: 3,
            k_keyword: 10,
            limit: 3,
            vector_weight: 0.6,
            keyword_weight: 0.4,
            normalization: ScoreNormalization::MinMax,
            fusion: FusionMode::Weighted,
            call_timeout: Duration::from_secs(5),
        }
    }
}

impl HybridSearchConfig {
    /// Reject configurations that cannot produce a meaningful ranking.
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(KioskError::config("result limit must be positive"));
        }
        if self.k_vector == 0 {
            return Err(KioskError::config("k_vector must be positive"));
        }
        for (name, weight) in [
            ("vector_weight", self.vector_weight),
            ("keyword_weight", self.keyword_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(KioskError::config(format!(
                    "{name} must be a non-negative number, got {weight}"
                )));
            }
        }
        if self.vector_weight + self.keyword_weight <= 0.0 {
            return Err(KioskError::config("at least one fusion weight must be positive"));
        }
        if self.call_timeout.is_zero() {
            return Err(KioskError::config("call timeout must be positive"));
        }
        Ok(())
    }
}

/// Score normalization strategies, applied per index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreNormalization {
    /// No normalization - use raw scores.
    None,
    /// Min-max normalization to [0, 1]. A list whose scores are all equal maps to 1.0.
    #[default]
    MinMax,
    /// `(n - rank) / n`, with equal scores sharing a rank.
    Rank,
}

/// Fusion strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionMode {
    /// Union both hit lists and rank by the weighted sum of normalized scores.
    #[default]
    Weighted,
    /// Rank vector hits only. The keyword lookup still runs and must succeed.
    VectorOnly,
}

/// Serde adapter storing a [`Duration`](std::time::Duration) as whole milliseconds.
pub(crate) mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
