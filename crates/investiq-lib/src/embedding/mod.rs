pub mod embedder;
pub mod ollama;

use async_trait::async_trait;

use crate::config::EMBEDDING_DIMENSION;
use crate::error::EmbeddingServiceError;

pub use embedder::LocalEmbedder;
pub use ollama::OllamaEmbedder;

/// Maps text to fixed-dimension vectors. Implementations must be
/// deterministic: the same text always yields the same vector.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Identifier of the underlying model, recorded in logs and status.
    fn model_id(&self) -> &str;

    /// Embed a batch of texts, preserving input order.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingServiceError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingServiceError> {
        let mut vectors = self.embed_many(&[text.to_string()]).await?;
        vectors.pop().ok_or(EmbeddingServiceError::CountMismatch {
            expected: 1,
            actual: 0,
        })
    }
}

/// Check that a backend returned one [`EMBEDDING_DIMENSION`]-long vector per
/// input.
pub fn check_vectors(
    expected: usize,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>, EmbeddingServiceError> {
    if vectors.len() != expected {
        return Err(EmbeddingServiceError::CountMismatch {
            expected,
            actual: vectors.len(),
        });
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != EMBEDDING_DIMENSION) {
        return Err(EmbeddingServiceError::DimensionMismatch {
            expected: EMBEDDING_DIMENSION,
            actual: bad.len(),
        });
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::HashEmbedder;

    #[test]
    fn check_vectors_accepts_matching_batch() {
        let vectors = vec![vec![0.0; EMBEDDING_DIMENSION]; 2];
        assert_eq!(check_vectors(2, vectors).unwrap().len(), 2);
    }

    #[test]
    fn check_vectors_rejects_wrong_dimension() {
        let err = check_vectors(1, vec![vec![0.0; 384]]).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingServiceError::DimensionMismatch {
                expected: 768,
                actual: 384
            }
        ));
    }

    #[test]
    fn check_vectors_rejects_wrong_count() {
        let err = check_vectors(3, vec![vec![0.0; EMBEDDING_DIMENSION]]).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingServiceError::CountMismatch {
                expected: 3,
                actual: 1
            }
        ));
    }

    #[tokio::test]
    async fn embed_is_deterministic() {
        let embedder = HashEmbedder::new();
        let first = embedder.embed("target industry").await.unwrap();
        let second = embedder.embed("target industry").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), EMBEDDING_DIMENSION);
    }
}
