//! Dense scorer over an external embedding model

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::document::{Document, ScoredDocument};
use crate::domain::retrieval::{cosine_similarity, Embedder, RetrievalScorer};
use crate::domain::DomainError;

/// Cosine similarity between the query embedding and stored document embeddings
#[derive(Debug, Clone)]
pub struct EmbeddingScorer {
    embedder: Arc<dyn Embedder>,
}

impl EmbeddingScorer {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, DomainError> {
        self.embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                DomainError::adapter(self.embedder.embedder_name(), "no embedding returned for query")
            })
    }
}

#[async_trait]
impl RetrievalScorer for EmbeddingScorer {
    async fn score(
        &self,
        query: &str,
        corpus: &[Document],
        _top_k: usize,
    ) -> Result<Vec<ScoredDocument>, DomainError> {
        if corpus.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embed_query(query).await?;

        corpus
            .iter()
            .map(|doc| {
                let embedding = doc.embedding.as_deref().ok_or_else(|| {
                    DomainError::adapter(
                        self.scorer_name(),
                        format!(
                            "document '{}' has no embedding; run update_embeddings first",
                            doc.id
                        ),
                    )
                })?;
                Ok(ScoredDocument::new(
                    doc.clone(),
                    cosine_similarity(&query_embedding, embedding),
                ))
            })
            .collect()
    }

    async fn embed_documents(
        &self,
        documents: &[Document],
    ) -> Result<Option<Vec<Vec<f32>>>, DomainError> {
        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;

        if embeddings.len() != documents.len() {
            return Err(DomainError::adapter(
                self.embedder.embedder_name(),
                format!("expected {} embeddings, got {}", documents.len(), embeddings.len()),
            ));
        }

        Ok(Some(embeddings))
    }

    fn scorer_name(&self) -> &'static str {
        "embedding"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::retrieval::MockEmbedder;

    fn embedder() -> MockEmbedder {
        let mut mock = MockEmbedder::new();
        mock.expect_embed().returning(|texts| {
            Ok(texts
                .iter()
                .map(|t| if t.contains("cat") { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
                .collect())
        });
        mock.expect_embedder_name().return_const("mock");
        mock
    }

    #[tokio::test]
    async fn test_scores_by_cosine() {
        let scorer = EmbeddingScorer::new(Arc::new(embedder()));
        let corpus = vec![
            Document::new("d1", "dog").with_embedding(vec![0.0, 1.0]),
            Document::new("d2", "cat").with_embedding(vec![1.0, 0.0]),
        ];

        let scored = scorer.score("a cat", &corpus, 2).await.unwrap();
        assert_eq!(scored[0].score, 0.0);
        assert_eq!(scored[1].score, 1.0);
    }

    #[tokio::test]
    async fn test_missing_embedding_is_adapter_failure() {
        let scorer = EmbeddingScorer::new(Arc::new(embedder()));
        let corpus = vec![Document::new("d1", "dog")];

        let err = scorer.score("cat", &corpus, 1).await.unwrap_err();
        assert!(matches!(err, DomainError::Adapter { .. }));
    }

    #[tokio::test]
    async fn test_embed_documents() {
        let scorer = EmbeddingScorer::new(Arc::new(embedder()));
        let embeddings = scorer
            .embed_documents(&[Document::new("d1", "cat"), Document::new("d2", "dog")])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }
}
