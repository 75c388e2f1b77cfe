//! Reading scoring adapter

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::document::{Answer, Document};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Capability interface for an answer-extraction model.
///
/// Implementations may include no-answer candidates (empty text) among
/// their results; the reader decides whether to keep them.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReadingScorer: Send + Sync + Debug {
    /// Extract up to `top_k` candidate answers for `query` from `documents`
    async fn score(
        &self,
        query: &str,
        documents: &[Document],
        top_k: usize,
    ) -> Result<Vec<Answer>, DomainError>;

    /// Get the scorer name
    fn scorer_name(&self) -> &'static str;
}
