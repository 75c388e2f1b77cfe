//! Retrieval capability interfaces

mod scorer;

pub use scorer::{cosine_similarity, DocumentEmbedder, Embedder, RetrievalScorer};

#[cfg(test)]
pub use scorer::{MockEmbedder, MockRetrievalScorer};
