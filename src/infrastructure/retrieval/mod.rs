//! Retrieval components and scorers

mod bm25;
mod embedding;
mod retriever;

pub use bm25::{Bm25Config, Bm25Scorer};
pub use embedding::EmbeddingScorer;
pub use retriever::Retriever;
