//! Pseudo-label generator: generated queries, mined negatives, margin scores

use std::sync::Arc;

use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::domain::comparator::Comparator;
use crate::domain::document::Document;
use crate::domain::pseudo_label::{GenerationReport, PseudoLabel, QuestionGenerator, SkipRecord};
use crate::domain::DomainError;
use crate::infrastructure::retrieval::Retriever;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PseudoLabelConfig {
    pub max_questions_per_document: usize,
    pub negatives_per_query: usize,
    /// Retrieval depth for mining; `negatives_per_query + 1` when unset
    pub retrieval_top_k: Option<usize>,
    /// Documents processed concurrently
    pub batch_size: usize,
}

impl Default for PseudoLabelConfig {
    fn default() -> Self {
        Self {
            max_questions_per_document: 3,
            negatives_per_query: 1,
            retrieval_top_k: None,
            batch_size: 16,
        }
    }
}

impl PseudoLabelConfig {
    pub fn mining_top_k(&self) -> usize {
        self.retrieval_top_k.unwrap_or(self.negatives_per_query + 1)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.max_questions_per_document == 0 {
            return Err(DomainError::configuration(
                "max_questions_per_document must be positive",
            ));
        }
        if self.negatives_per_query == 0 {
            return Err(DomainError::configuration("negatives_per_query must be positive"));
        }
        if self.batch_size == 0 {
            return Err(DomainError::configuration("batch_size must be positive"));
        }
        if self.retrieval_top_k == Some(0) {
            return Err(DomainError::configuration("retrieval_top_k must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PseudoLabelGenerator {
    retriever: Retriever,
    questions: Arc<dyn QuestionGenerator>,
    comparator: Arc<dyn Comparator>,
    config: PseudoLabelConfig,
}

impl PseudoLabelGenerator {
    pub fn new(
        retriever: Retriever,
        questions: Arc<dyn QuestionGenerator>,
        comparator: Arc<dyn Comparator>,
        config: PseudoLabelConfig,
    ) -> Result<Self, DomainError> {
        config.validate()?;
        Ok(Self {
            retriever,
            questions,
            comparator,
            config,
        })
    }

    /// Generate over every document in the retriever's store
    pub async fn generate(&self) -> Result<GenerationReport, DomainError> {
        let documents = self.retriever.store().get_all_documents(None).await?;
        Ok(self.generate_for(&documents).await)
    }

    /// Generate over `documents`; ordered by document, query, then negative rank
    pub async fn generate_for(&self, documents: &[Document]) -> GenerationReport {
        info!(
            documents = documents.len(),
            batch_size = self.config.batch_size,
            "Generating pseudo labels"
        );

        let mut report = GenerationReport::default();
        for batch in documents.chunks(self.config.batch_size) {
            let reports = join_all(batch.iter().map(|doc| self.process_document(doc))).await;
            for document_report in reports {
                report.merge(document_report);
            }
        }

        info!(
            labels = report.labels.len(),
            skipped = report.skipped.len(),
            "Pseudo label generation finished"
        );
        report
    }

    async fn process_document(&self, document: &Document) -> GenerationReport {
        let mut report = GenerationReport::default();

        let mut queries = match self
            .questions
            .generate(document, self.config.max_questions_per_document)
            .await
        {
            Ok(queries) => queries,
            Err(e) => {
                warn!(document = %document.id, error = %e, "Question generation failed");
                report
                    .skipped
                    .push(SkipRecord::adapter_failure(&document.id, None, e.to_string()));
                return report;
            }
        };
        queries.truncate(self.config.max_questions_per_document);

        if queries.is_empty() {
            debug!(document = %document.id, "No questions generated");
            report.skipped.push(SkipRecord::no_questions(&document.id));
            return report;
        }

        for query in queries {
            match self.label_query(document, &query).await {
                Ok(labels) if labels.is_empty() => {
                    debug!(document = %document.id, query = %query, "No negatives mined");
                    report.skipped.push(SkipRecord::no_negatives(&document.id, query));
                }
                Ok(labels) => report.labels.extend(labels),
                Err(e) => {
                    warn!(document = %document.id, query = %query, error = %e, "Query skipped");
                    report
                        .skipped
                        .push(SkipRecord::adapter_failure(&document.id, Some(query), e.to_string()));
                }
            }
        }

        report
    }

    /// Mine negatives for one (query, positive) pair and score the margins
    async fn label_query(
        &self,
        positive: &Document,
        query: &str,
    ) -> Result<Vec<PseudoLabel>, DomainError> {
        let negatives: Vec<Document> = self
            .retriever
            .retrieve(query, self.config.mining_top_k(), None)
            .await?
            .into_iter()
            .filter(|scored| scored.id() != positive.id)
            .take(self.config.negatives_per_query)
            .map(|scored| scored.document)
            .collect();

        if negatives.is_empty() {
            return Ok(Vec::new());
        }

        let positive_score = self.comparator.score(query, &positive.content).await?;

        let mut labels = Vec::with_capacity(negatives.len());
        for negative in negatives {
            let negative_score = self.comparator.score(query, &negative.content).await?;
            labels.push(PseudoLabel {
                query: query.to_string(),
                positive_document_id: positive.id.clone(),
                negative_document_id: negative.id,
                margin: positive_score - negative_score,
            });
        }

        Ok(labels)
    }
}
