//! Deterministic local embedder based on feature hashing.
//!
//! Each lowercase word token is hashed into one of `dimension` buckets with a
//! hash-derived sign, and the resulting bag-of-words vector is L2-normalized.
//! It needs no network or model files, which makes it the embedder of choice
//! for offline demos and tests. Texts sharing words land close together under
//! cosine similarity; it has no notion of synonyms.

use std::hash::{BuildHasher, Hash, Hasher};

use ahash::RandomState;
use async_trait::async_trait;

use crate::embedding::text_embedder::TextEmbedder;
use crate::error::{KioskError, Result};
use crate::keyword_index::tokenizer::tokenize;

// Fixed seeds keep bucket assignment identical across processes.
const SEEDS: [u64; 4] = [
    0x6b69_6f73_6b00_0001,
    0x6b69_6f73_6b00_0002,
    0x6b69_6f73_6b00_0003,
    0x6b69_6f73_6b00_0004,
];

/// Feature-hashing text embedder.
#[derive(Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    hasher: RandomState,
}

impl std::fmt::Debug for HashingEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashingEmbedder")
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl HashingEmbedder {
    /// Create a new hashing embedder producing `dimension`-sized vectors.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(KioskError::config("embedding dimension must be positive"));
        }
        Ok(Self {
            dimension,
            hasher: RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3]),
        })
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let mut state = self.hasher.build_hasher();
            token.hash(&mut state);
            let hash = state.finish();
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl TextEmbedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_sync(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing"
    }
}
