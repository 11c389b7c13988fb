//! Similarity metrics for vector comparison.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{KioskError, Result};

/// Below this many candidates scoring stays on the calling thread.
const PARALLEL_THRESHOLD: usize = 1024;

/// Similarity metric, fixed per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine similarity, in `[-1, 1]`. Zero vectors score 0.
    #[default]
    Cosine,
    /// Inner product, unbounded. Equals cosine for unit vectors.
    DotProduct,
    /// `1 / (1 + L2 distance)`, in `(0, 1]`.
    Euclidean,
}

impl DistanceMetric {
    /// Calculate the similarity between two vectors (higher is more similar).
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        if a.len() != b.len() {
            return Err(KioskError::DimensionMismatch {
                expected: a.len(),
                actual: b.len(),
            });
        }

        let result = match self {
            DistanceMetric::Cosine => {
                let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
                let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

                if norm_a == 0.0 || norm_b == 0.0 {
                    0.0
                } else {
                    (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
                }
            }
            DistanceMetric::DotProduct => a.iter().zip(b.iter()).map(|(x, y)| x * y).sum(),
            DistanceMetric::Euclidean => {
                let distance = a
                    .iter()
                    .zip(b.iter())
                    .map(|(x, y)| (x - y).powi(2))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + distance)
            }
        };

        Ok(result)
    }

    /// Get the name of this metric.
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::DotProduct => "dot_product",
            DistanceMetric::Euclidean => "euclidean",
        }
    }

    /// Parse a metric from a string.
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "dot_product" | "dot" | "inner_product" => Ok(DistanceMetric::DotProduct),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            _ => Err(KioskError::config(format!("Unknown distance metric: {s}"))),
        }
    }

    /// Similarities between a query and many vectors, in input order.
    pub fn batch_similarity(&self, query: &[f32], vectors: &[&[f32]]) -> Result<Vec<f32>> {
        if vectors.len() < PARALLEL_THRESHOLD {
            return vectors
                .iter()
                .map(|v| self.similarity(query, v))
                .collect::<Result<Vec<_>>>();
        }

        vectors
            .par_iter()
            .map(|v| self.similarity(query, v))
            .collect::<Result<Vec<_>>>()
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = KioskError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_str(s)
    }
}
