//! Query sources for pseudo-label generation

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::document::Document;
use crate::domain::DomainError;

/// Produces synthetic queries a document should answer
#[cfg_attr(test, automock)]
#[async_trait]
pub trait QuestionGenerator: Send + Sync + Debug {
    /// At most `max_questions` queries for `document`; may return none
    async fn generate(
        &self,
        document: &Document,
        max_questions: usize,
    ) -> Result<Vec<String>, DomainError>;

    fn generator_name(&self) -> &'static str;
}

/// Questions supplied up front as (query, document id) pairs
#[derive(Debug, Clone, Default)]
pub struct PreSuppliedQuestions {
    by_document: HashMap<String, Vec<String>>,
}

impl PreSuppliedQuestions {
    pub fn new<Q, D>(pairs: impl IntoIterator<Item = (Q, D)>) -> Self
    where
        Q: Into<String>,
        D: Into<String>,
    {
        let mut by_document: HashMap<String, Vec<String>> = HashMap::new();
        for (query, document_id) in pairs {
            by_document
                .entry(document_id.into())
                .or_default()
                .push(query.into());
        }
        Self { by_document }
    }

    pub fn len(&self) -> usize {
        self.by_document.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_document.is_empty()
    }
}

#[async_trait]
impl QuestionGenerator for PreSuppliedQuestions {
    async fn generate(
        &self,
        document: &Document,
        max_questions: usize,
    ) -> Result<Vec<String>, DomainError> {
        Ok(self
            .by_document
            .get(&document.id)
            .map(|queries| queries.iter().take(max_questions).cloned().collect())
            .unwrap_or_default())
    }

    fn generator_name(&self) -> &'static str {
        "pre_supplied"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pre_supplied_keeps_order_and_limit() {
        let questions = PreSuppliedQuestions::new(vec![
            ("q1", "d1"),
            ("q2", "d2"),
            ("q3", "d1"),
            ("q4", "d1"),
        ]);
        assert_eq!(questions.len(), 4);

        let generated = questions
            .generate(&Document::new("d1", "text"), 2)
            .await
            .unwrap();
        assert_eq!(generated, vec!["q1", "q3"]);

        let none = questions
            .generate(&Document::new("d9", "text"), 2)
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
