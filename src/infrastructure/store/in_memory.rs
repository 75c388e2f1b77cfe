//! In-memory document store
//!
//! Readers clone an `Arc` to the current snapshot and never block on a
//! rebuild. Writers hold `write_lock` for their whole operation, build a new
//! snapshot off to the side and publish it with a single swap.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::domain::document::{Document, MetadataFilter};
use crate::domain::label::{Label, LabelAggregator, MultiLabel};
use crate::domain::retrieval::DocumentEmbedder;
use crate::domain::store::{
    DeleteDocumentsResult, DeleteTarget, DocumentStore, DuplicatePolicy, WriteDocumentsResult,
};
use crate::domain::DomainError;

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    snapshot: RwLock<Arc<Vec<Document>>>,
    labels: RwLock<Vec<Label>>,
    write_lock: Mutex<()>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current corpus snapshot; unaffected by later writes
    pub async fn snapshot(&self) -> Arc<Vec<Document>> {
        Arc::clone(&*self.snapshot.read().await)
    }

    async fn publish(&self, documents: Vec<Document>) {
        *self.snapshot.write().await = Arc::new(documents);
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn store_type(&self) -> &'static str {
        "in_memory"
    }

    async fn write_documents(
        &self,
        documents: Vec<Document>,
        policy: DuplicatePolicy,
    ) -> Result<WriteDocumentsResult, DomainError> {
        let _guard = self.write_lock.lock().await;
        let current = self.snapshot().await;

        let mut next: Vec<Document> = current.as_ref().clone();
        let mut positions: HashMap<String, usize> = next
            .iter()
            .enumerate()
            .map(|(i, doc)| (doc.id.clone(), i))
            .collect();
        let mut result = WriteDocumentsResult::default();

        for document in documents {
            if document.id.trim().is_empty() {
                return Err(DomainError::validation("document id cannot be empty"));
            }

            match positions.get(&document.id).copied() {
                Some(position) => match policy {
                    DuplicatePolicy::Overwrite => {
                        next[position] = document;
                        result.overwritten += 1;
                    }
                    DuplicatePolicy::Skip => result.skipped += 1,
                    DuplicatePolicy::Fail => {
                        return Err(DomainError::validation(format!(
                            "document '{}' already exists",
                            document.id
                        )));
                    }
                },
                None => {
                    positions.insert(document.id.clone(), next.len());
                    next.push(document);
                    result.written += 1;
                }
            }
        }

        self.publish(next).await;
        debug!(
            written = result.written,
            overwritten = result.overwritten,
            skipped = result.skipped,
            "Wrote documents"
        );

        Ok(result)
    }

    async fn delete_documents(
        &self,
        target: DeleteTarget,
    ) -> Result<DeleteDocumentsResult, DomainError> {
        let _guard = self.write_lock.lock().await;
        let current = self.snapshot().await;

        let result = match target {
            DeleteTarget::All => {
                self.publish(Vec::new()).await;
                DeleteDocumentsResult {
                    deleted: current.len(),
                    not_found: 0,
                }
            }
            DeleteTarget::Ids(ids) => {
                let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
                let present: HashSet<&str> = current.iter().map(|doc| doc.id.as_str()).collect();

                let next: Vec<Document> = current
                    .iter()
                    .filter(|doc| !wanted.contains(doc.id.as_str()))
                    .cloned()
                    .collect();
                let deleted = current.len() - next.len();
                let not_found = wanted.iter().filter(|id| !present.contains(*id)).count();

                self.publish(next).await;
                DeleteDocumentsResult { deleted, not_found }
            }
        };

        debug!(deleted = result.deleted, "Deleted documents");
        Ok(result)
    }

    async fn get_all_documents(
        &self,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>, DomainError> {
        if let Some(filter) = filter {
            filter.validate()?;
        }

        let snapshot = self.snapshot().await;
        Ok(snapshot
            .iter()
            .filter(|doc| filter.is_none_or(|f| f.matches(&doc.metadata)))
            .cloned()
            .collect())
    }

    async fn get_documents_by_ids(&self, ids: &[String]) -> Result<Vec<Document>, DomainError> {
        let snapshot = self.snapshot().await;
        let by_id: HashMap<&str, &Document> =
            snapshot.iter().map(|doc| (doc.id.as_str(), doc)).collect();

        Ok(ids
            .iter()
            .filter_map(|id| by_id.get(id.as_str()).map(|doc| (*doc).clone()))
            .collect())
    }

    async fn document_count(&self) -> Result<usize, DomainError> {
        Ok(self.snapshot.read().await.len())
    }

    async fn write_labels(&self, labels: Vec<Label>) -> Result<usize, DomainError> {
        if let Some(label) = labels.iter().find(|l| l.query.trim().is_empty()) {
            return Err(DomainError::validation(format!(
                "label '{}' has an empty query",
                label.id
            )));
        }

        let count = labels.len();
        self.labels.write().await.extend(labels);
        Ok(count)
    }

    async fn get_all_labels(&self) -> Result<Vec<Label>, DomainError> {
        Ok(self.labels.read().await.clone())
    }

    async fn get_all_labels_aggregated(
        &self,
        drop_negative: bool,
        drop_no_answer: bool,
    ) -> Result<Vec<MultiLabel>, DomainError> {
        let labels = self.get_all_labels().await?;
        Ok(LabelAggregator::new(drop_negative, drop_no_answer).aggregate(labels))
    }

    async fn update_embeddings(&self, embedder: &dyn DocumentEmbedder) -> Result<usize, DomainError> {
        let _guard = self.write_lock.lock().await;
        let current = self.snapshot().await;

        let embeddings = embedder.embed_documents(&current).await?;
        if embeddings.len() != current.len() {
            return Err(DomainError::adapter(
                "document_embedder",
                format!(
                    "returned {} embeddings for {} documents",
                    embeddings.len(),
                    current.len()
                ),
            ));
        }

        let next: Vec<Document> = current
            .iter()
            .cloned()
            .zip(embeddings)
            .map(|(doc, embedding)| doc.with_embedding(embedding))
            .collect();
        let count = next.len();

        self.publish(next).await;
        info!(documents = count, "Rebuilt document embeddings");

        Ok(count)
    }
}
