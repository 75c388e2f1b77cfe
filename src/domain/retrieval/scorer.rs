//! Retrieval scoring adapters

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::document::{Document, ScoredDocument};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Capability interface for a retrieval model (sparse or dense)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RetrievalScorer: Send + Sync + Debug {
    /// Score `corpus` against `query` and return up to `top_k` ranked documents
    async fn score(
        &self,
        query: &str,
        corpus: &[Document],
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>, DomainError>;

    /// Compute document embeddings, or `None` when this scorer does not use them
    async fn embed_documents(
        &self,
        _documents: &[Document],
    ) -> Result<Option<Vec<Vec<f32>>>, DomainError> {
        Ok(None)
    }

    /// Get the scorer name
    fn scorer_name(&self) -> &'static str;
}

/// External text embedding model
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Embedder: Send + Sync + Debug {
    /// Embed each text into a vector; output order matches input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError>;

    fn embedder_name(&self) -> &'static str;
}

/// Something able to compute embeddings for a whole corpus snapshot
#[async_trait]
pub trait DocumentEmbedder: Send + Sync + Debug {
    async fn embed_documents(&self, documents: &[Document]) -> Result<Vec<Vec<f32>>, DomainError>;
}

/// Cosine similarity of two vectors; zero when either has no magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_mock_scorer_name() {
        let mut scorer = MockRetrievalScorer::new();
        scorer.expect_scorer_name().return_const("mock");

        assert_eq!(scorer.scorer_name(), "mock");
    }
}
