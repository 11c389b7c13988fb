//! Text embedding trait for Kiosk's semantic search pipeline.

use async_trait::async_trait;

use crate::error::{KioskError, Result};

/// Trait for converting text to dense vector embeddings.
///
/// Every embedder is configured with a fixed output dimensionality. Vectors
/// produced at indexing time and at query time must share it; a mismatch is
/// a configuration error, see [`check_dimension`].
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use kiosk::embedding::TextEmbedder;
/// use kiosk::error::Result;
///
/// struct ConstantEmbedder {
///     dimension: usize,
/// }
///
/// #[async_trait]
/// impl TextEmbedder for ConstantEmbedder {
///     async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
///         Ok(vec![1.0; self.dimension])
///     }
///
///     fn dimension(&self) -> usize {
///         self.dimension
///     }
/// }
/// ```
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Generate an embedding vector for the given text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, preserving input order.
    ///
    /// The default implementation calls `embed` sequentially. Override this
    /// when the provider accepts batches.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Dimension of every vector this embedder produces.
    fn dimension(&self) -> usize;

    /// Name of this embedder, for logging.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Fail with [`KioskError::DimensionMismatch`] unless `vector` has `expected` entries.
pub fn check_dimension(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(KioskError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingEmbedder;

    #[async_trait]
    impl TextEmbedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32])
        }

        fn dimension(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn test_default_batch_preserves_order() {
        let embedder = CountingEmbedder;
        let vectors = embedder.embed_batch(&["a", "abc", "ab"]).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0], vec![3.0], vec![2.0]]);
        assert_eq!(embedder.name(), "unknown");
    }

    #[test]
    fn test_check_dimension() {
        assert!(check_dimension(2, &[0.0, 1.0]).is_ok());
        match check_dimension(3, &[0.0, 1.0]) {
            Err(KioskError::DimensionMismatch { expected, actual }) => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
