//! Retriever: ranks a store's documents with a retrieval scorer

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::document::{Document, MetadataFilter, ScoredDocument};
use crate::domain::retrieval::{DocumentEmbedder, RetrievalScorer};
use crate::domain::store::DocumentStore;
use crate::domain::DomainError;

/// Wraps a scorer with ranking, truncation and index rebuild orchestration
#[derive(Debug, Clone)]
pub struct Retriever {
    scorer: Arc<dyn RetrievalScorer>,
    store: Arc<dyn DocumentStore>,
    default_top_k: usize,
}

impl Retriever {
    pub fn new(scorer: Arc<dyn RetrievalScorer>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            scorer,
            store,
            default_top_k: 10,
        }
    }

    pub fn with_default_top_k(mut self, top_k: usize) -> Result<Self, DomainError> {
        if top_k == 0 {
            return Err(DomainError::configuration("top_k must be a positive integer"));
        }
        self.default_top_k = top_k;
        Ok(self)
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn scorer_name(&self) -> &'static str {
        self.scorer.scorer_name()
    }

    /// Documents ranked by descending score, ties in corpus order
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        filters: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredDocument>, DomainError> {
        if top_k == 0 {
            return Err(DomainError::configuration("top_k must be a positive integer"));
        }

        let corpus = self.store.get_all_documents(filters).await?;
        if corpus.is_empty() {
            return Ok(Vec::new());
        }

        let scored = self.scorer.score(query, &corpus, top_k).await?;
        if let Some(doc) = scored.iter().find(|doc| !doc.score.is_finite()) {
            return Err(DomainError::adapter(
                self.scorer.scorer_name(),
                format!("non-finite score {} for document '{}'", doc.score, doc.id()),
            ));
        }
        let ranked = rank(&corpus, scored, top_k);

        debug!(
            scorer = self.scorer.scorer_name(),
            corpus = corpus.len(),
            returned = ranked.len(),
            "Retrieved documents"
        );

        Ok(ranked)
    }

    /// Recompute every document embedding as one atomic index rebuild
    pub async fn update_embeddings(&self) -> Result<usize, DomainError> {
        info!(scorer = self.scorer.scorer_name(), "Updating document embeddings");
        self.store.update_embeddings(self).await
    }
}

/// Stable sort by score, then truncate
fn rank(corpus: &[Document], scored: Vec<ScoredDocument>, top_k: usize) -> Vec<ScoredDocument> {
    let positions: HashMap<&str, usize> = corpus
        .iter()
        .enumerate()
        .map(|(i, doc)| (doc.id.as_str(), i))
        .collect();

    let mut keyed: Vec<(usize, ScoredDocument)> = scored
        .into_iter()
        .map(|doc| (positions.get(doc.id()).copied().unwrap_or(usize::MAX), doc))
        .collect();

    keyed.sort_by(|(pos_a, a), (pos_b, b)| b.score.total_cmp(&a.score).then(pos_a.cmp(pos_b)));
    keyed.truncate(top_k);
    keyed.into_iter().map(|(_, doc)| doc).collect()
}

#[async_trait]
impl DocumentEmbedder for Retriever {
    async fn embed_documents(&self, documents: &[Document]) -> Result<Vec<Vec<f32>>, DomainError> {
        self.scorer.embed_documents(documents).await?.ok_or_else(|| {
            DomainError::configuration(format!(
                "scorer '{}' does not use embeddings",
                self.scorer.scorer_name()
            ))
        })
    }
}
