//! Training triples and the run report

use serde::{Deserialize, Serialize};

/// A weighted (query, positive, negative) training triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PseudoLabel {
    pub query: String,
    pub positive_document_id: String,
    pub negative_document_id: String,
    /// `score(query, positive) - score(query, negative)`
    pub margin: f32,
}

/// Why a document or generated query produced no labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoQuestions,
    NoNegatives,
    /// A generator, retriever or comparator call failed
    AdapterFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipRecord {
    pub document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub reason: SkipReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SkipRecord {
    pub fn no_questions(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            query: None,
            reason: SkipReason::NoQuestions,
            message: None,
        }
    }

    pub fn no_negatives(document_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            query: Some(query.into()),
            reason: SkipReason::NoNegatives,
            message: None,
        }
    }

    pub fn adapter_failure(
        document_id: impl Into<String>,
        query: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            query,
            reason: SkipReason::AdapterFailure,
            message: Some(message.into()),
        }
    }
}

/// Labels emitted by one generator run plus everything it skipped
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub labels: Vec<PseudoLabel>,
    pub skipped: Vec<SkipRecord>,
}

impl GenerationReport {
    pub fn skipped_count(&self, reason: SkipReason) -> usize {
        self.skipped.iter().filter(|s| s.reason == reason).count()
    }

    pub fn merge(&mut self, other: GenerationReport) {
        self.labels.extend(other.labels);
        self.skipped.extend(other.skipped);
    }
}
