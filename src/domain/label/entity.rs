//! Ground-truth label entities

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::document::Answer;
use crate::domain::DomainError;

/// Where a label came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelOrigin {
    #[default]
    Gold,
    Generated,
}

/// One ground-truth fact about a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    #[serde(default = "new_label_id")]
    pub id: String,
    pub query: String,
    pub document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<Answer>,
    pub is_correct_document: bool,
    pub is_correct_answer: bool,
    #[serde(default)]
    pub origin: LabelOrigin,
}

fn new_label_id() -> String {
    Uuid::new_v4().to_string()
}

impl Label {
    /// Create a positive document-level label without an answer
    pub fn new(query: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            id: new_label_id(),
            query: query.into(),
            document_id: document_id.into(),
            answer: None,
            is_correct_document: true,
            is_correct_answer: true,
            origin: LabelOrigin::Gold,
        }
    }

    pub fn with_answer(mut self, answer: Answer) -> Self {
        self.answer = Some(answer);
        self
    }

    pub fn with_correctness(mut self, is_correct_document: bool, is_correct_answer: bool) -> Self {
        self.is_correct_document = is_correct_document;
        self.is_correct_answer = is_correct_answer;
        self
    }

    pub fn with_origin(mut self, origin: LabelOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Neither the document nor the answer is marked correct
    pub fn is_negative(&self) -> bool {
        !self.is_correct_document && !self.is_correct_answer
    }

    /// The label carries no answer text
    pub fn is_no_answer(&self) -> bool {
        self.answer.as_ref().is_none_or(Answer::is_no_answer)
    }
}

/// All labels sharing one query; the unit evaluation is computed against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MultiLabelRecord")]
pub struct MultiLabel {
    query: String,
    labels: Vec<Label>,
}

#[derive(Deserialize)]
struct MultiLabelRecord {
    query: String,
    #[serde(default)]
    labels: Vec<Label>,
}

impl TryFrom<MultiLabelRecord> for MultiLabel {
    type Error = DomainError;

    fn try_from(record: MultiLabelRecord) -> Result<Self, Self::Error> {
        Self::new(record.query, record.labels)
    }
}

impl MultiLabel {
    /// Build a multi-label, rejecting labels whose query differs
    pub fn new(query: impl Into<String>, labels: Vec<Label>) -> Result<Self, DomainError> {
        let query = query.into();

        if let Some(stray) = labels.iter().find(|l| l.query != query) {
            return Err(DomainError::validation(format!(
                "label '{}' has query '{}' but multi-label query is '{}'",
                stray.id, stray.query, query
            )));
        }

        Ok(Self { query, labels })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Distinct ids of documents marked correct, in label order
    pub fn gold_document_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();

        for label in self.labels.iter().filter(|l| l.is_correct_document) {
            if !ids.contains(&label.document_id) {
                ids.push(label.document_id.clone());
            }
        }

        ids
    }

    /// Distinct non-empty answer texts marked correct, in label order
    pub fn gold_answers(&self) -> Vec<String> {
        let mut answers: Vec<String> = Vec::new();

        let texts = self
            .labels
            .iter()
            .filter(|l| l.is_correct_answer)
            .filter_map(|l| l.answer.as_ref())
            .filter(|a| !a.is_no_answer());

        for answer in texts {
            if !answers.contains(&answer.text) {
                answers.push(answer.text.clone());
            }
        }

        answers
    }

    /// Every label is a no-answer label
    pub fn is_no_answer(&self) -> bool {
        self.labels.iter().all(Label::is_no_answer)
    }
}
