//! Text pair comparator used for semantic answer similarity and margin scoring

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Stateless scorer of a text pair; deterministic for fixed inputs
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Comparator: Send + Sync + Debug {
    async fn score(&self, text_a: &str, text_b: &str) -> Result<f32, DomainError>;

    fn comparator_name(&self) -> &'static str;
}
