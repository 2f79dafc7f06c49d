//! The embedding provider seam (§1, §4.9 supplement). Production wiring of
//! a real embedding model is out of scope; this crate only needs
//! something that maps text to a fixed-dimension vector.

use async_trait::async_trait;
use scour_types::{Result, ScourError};

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Backs tests and deployments with semantic mode disabled. Returns an
/// explicit error rather than silently falling back to BM25, so a caller
/// asking for semantic or hybrid mode is never surprised by an
/// unannounced ranking-mode change.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEmbeddingProvider;

#[async_trait]
impl EmbeddingProvider for NoopEmbeddingProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(ScourError::Unavailable("semantic mode unavailable: no embedding provider configured".into()))
    }
}

/// Cosine similarity between two vectors of equal dimension. Returns `0.0`
/// for mismatched dimensions or a zero-magnitude vector rather than
/// panicking, since a corrupt or stale embedding must not crash a search
/// request.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_provider_reports_unavailable() {
        let err = NoopEmbeddingProvider.embed("hello").await.unwrap_err();
        assert!(matches!(err, ScourError::Unavailable(_)));
    }

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_have_similarity_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn mismatched_dimensions_yield_zero_not_panic() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }
}
