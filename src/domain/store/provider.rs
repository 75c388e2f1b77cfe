//! Document store trait

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::document::{Document, MetadataFilter};
use crate::domain::label::{Label, MultiLabel};
use crate::domain::retrieval::DocumentEmbedder;
use crate::domain::DomainError;

/// How to treat a written document whose id already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Replace the stored document, keeping its insertion position
    #[default]
    Overwrite,
    /// Keep the stored document and ignore the new one
    Skip,
    /// Reject the whole write
    Fail,
}

/// Documents targeted by a delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    Ids(Vec<String>),
    All,
}

/// Result of writing documents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteDocumentsResult {
    pub written: usize,
    pub overwritten: usize,
    pub skipped: usize,
}

/// Result of deleting documents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteDocumentsResult {
    pub deleted: usize,
    pub not_found: usize,
}

/// Shared document/label index.
///
/// Writes and embedding rebuilds are serialised against each other; reads
/// always observe a complete snapshot, never a partially applied write.
#[async_trait]
pub trait DocumentStore: Send + Sync + Debug {
    /// Get the store type name
    fn store_type(&self) -> &'static str;

    async fn write_documents(
        &self,
        documents: Vec<Document>,
        policy: DuplicatePolicy,
    ) -> Result<WriteDocumentsResult, DomainError>;

    async fn delete_documents(
        &self,
        target: DeleteTarget,
    ) -> Result<DeleteDocumentsResult, DomainError>;

    /// All documents in insertion order, optionally filtered
    async fn get_all_documents(
        &self,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>, DomainError>;

    /// Documents with the given ids, in the order requested; unknown ids are omitted
    async fn get_documents_by_ids(&self, ids: &[String]) -> Result<Vec<Document>, DomainError>;

    async fn document_count(&self) -> Result<usize, DomainError>;

    async fn write_labels(&self, labels: Vec<Label>) -> Result<usize, DomainError>;

    async fn get_all_labels(&self) -> Result<Vec<Label>, DomainError>;

    async fn get_all_labels_aggregated(
        &self,
        drop_negative: bool,
        drop_no_answer: bool,
    ) -> Result<Vec<MultiLabel>, DomainError>;

    /// Recompute every document's embedding as a full-index rebuild
    async fn update_embeddings(&self, embedder: &dyn DocumentEmbedder) -> Result<usize, DomainError>;
}
