//! Reader: ranks extracted answers and applies no-answer handling

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::domain::document::{Answer, Document};
use crate::domain::reading::ReadingScorer;
use crate::domain::DomainError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub top_k: usize,
    /// Keep one no-answer candidate in the ranking
    pub return_no_answer: bool,
    /// Confidence given to the no-answer candidate when the scorer proposes none
    pub no_answer_threshold: f32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            return_no_answer: false,
            no_answer_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reader {
    scorer: Arc<dyn ReadingScorer>,
    config: ReaderConfig,
}

impl Reader {
    pub fn new(scorer: Arc<dyn ReadingScorer>) -> Self {
        Self {
            scorer,
            config: ReaderConfig::default(),
        }
    }

    pub fn with_config(scorer: Arc<dyn ReadingScorer>, config: ReaderConfig) -> Self {
        Self { scorer, config }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Answers ranked by confidence, then document order, then offset start
    pub async fn read(
        &self,
        query: &str,
        documents: &[Document],
        top_k: usize,
    ) -> Result<Vec<Answer>, DomainError> {
        if top_k == 0 {
            return Err(DomainError::configuration("top_k must be a positive integer"));
        }

        if documents.is_empty() {
            return Ok(if self.config.return_no_answer {
                vec![Answer::no_answer(self.config.no_answer_threshold)]
            } else {
                Vec::new()
            });
        }

        let candidates = self.scorer.score(query, documents, top_k).await?;
        let (mut answers, no_answers): (Vec<Answer>, Vec<Answer>) =
            candidates.into_iter().partition(|a| !a.is_no_answer());

        if self.config.return_no_answer {
            let confidence = no_answers
                .iter()
                .map(|a| a.confidence)
                .fold(None, |best: Option<f32>, c| Some(best.map_or(c, |b| b.max(c))))
                .unwrap_or(self.config.no_answer_threshold);
            answers.push(Answer::no_answer(confidence));
        }

        let order: HashMap<&str, usize> = documents
            .iter()
            .enumerate()
            .map(|(i, doc)| (doc.id.as_str(), i))
            .collect();
        let document_rank = |answer: &Answer| {
            answer
                .document_id
                .as_deref()
                .and_then(|id| order.get(id).copied())
                .unwrap_or(usize::MAX)
        };

        answers.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| document_rank(a).cmp(&document_rank(b)))
                .then_with(|| a.offset_start().cmp(&b.offset_start()))
        });
        answers.truncate(top_k);

        debug!(
            scorer = self.scorer.scorer_name(),
            documents = documents.len(),
            answers = answers.len(),
            "Read answers"
        );

        Ok(answers)
    }
}
