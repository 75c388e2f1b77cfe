//! Document and answer entities

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A unit of the corpus. Identity is the `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier within a corpus snapshot
    pub id: String,
    /// Document content text
    pub content: String,
    /// Scalar metadata used by filters
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Embedding vector, present after an embedding refresh
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    /// Create a new document
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: HashMap::new(),
            embedding: None,
        }
    }

    /// Add metadata to the document
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Set all metadata
    pub fn with_all_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set the embedding vector
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

/// A document paired with the relevance score it was retrieved with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

impl ScoredDocument {
    pub fn new(document: Document, score: f32) -> Self {
        Self { document, score }
    }

    pub fn id(&self) -> &str {
        &self.document.id
    }
}

/// Character offsets of an answer span inside a document's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// An extracted answer. Empty `text` is the distinguished no-answer value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offsets: Option<Span>,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

impl Answer {
    /// Create an answer span extracted from a document
    pub fn new(
        text: impl Into<String>,
        document_id: impl Into<String>,
        offsets: Span,
        confidence: f32,
    ) -> Self {
        Self {
            text: text.into(),
            offsets: Some(offsets),
            confidence,
            document_id: Some(document_id.into()),
        }
    }

    /// Create the no-answer value at the given confidence
    pub fn no_answer(confidence: f32) -> Self {
        Self {
            text: String::new(),
            offsets: None,
            confidence,
            document_id: None,
        }
    }

    pub fn is_no_answer(&self) -> bool {
        self.text.is_empty()
    }

    /// Offset start used for tie-breaking; no-answer sorts last
    pub fn offset_start(&self) -> usize {
        self.offsets.map(|s| s.start).unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_builder() {
        let doc = Document::new("d1", "Paris is the capital of France")
            .with_metadata("lang", json!("en"))
            .with_embedding(vec![0.1, 0.2]);

        assert_eq!(doc.id, "d1");
        assert_eq!(doc.metadata.get("lang"), Some(&json!("en")));
        assert!(doc.has_embedding());
    }

    #[test]
    fn test_no_answer() {
        let answer = Answer::no_answer(0.3);
        assert!(answer.is_no_answer());
        assert!(answer.document_id.is_none());
        assert_eq!(answer.offset_start(), usize::MAX);
    }

    #[test]
    fn test_answer_span() {
        let answer = Answer::new("Paris", "d1", Span::new(0, 5), 0.9);
        assert!(!answer.is_no_answer());
        assert_eq!(answer.offset_start(), 0);
    }

    #[test]
    fn test_document_serialization_skips_empty_fields() {
        let doc = Document::new("d1", "text");
        let json = serde_json::to_string(&doc).unwrap();
        assert!(!json.contains("metadata"));
        assert!(!json.contains("embedding"));

        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }
}
