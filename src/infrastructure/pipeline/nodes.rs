//! Pipeline node adapters for the retrieval and reading components

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::json;

use crate::domain::document::{Document, MetadataFilter, ScoredDocument};
use crate::domain::pipeline::{NodeInput, NodeOutput, NodeParams, PipelineNode};
use crate::domain::DomainError;
use crate::infrastructure::reading::Reader;
use crate::infrastructure::retrieval::Retriever;

const TOP_K: &str = "top_k";
const FILTERS: &str = "filters";

/// Retrieves documents for the query. Params: `top_k`, `filters`.
#[derive(Debug, Clone)]
pub struct RetrieverNode {
    retriever: Retriever,
    filters: Option<MetadataFilter>,
}

impl RetrieverNode {
    pub fn new(retriever: Retriever) -> Self {
        Self {
            retriever,
            filters: None,
        }
    }

    pub fn with_filters(mut self, filters: MetadataFilter) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }
}

#[async_trait]
impl PipelineNode for RetrieverNode {
    fn component_type(&self) -> &'static str {
        "retriever"
    }

    fn default_params(&self) -> NodeParams {
        let params = NodeParams::new().with(TOP_K, json!(self.retriever.default_top_k()));
        match self.filters.as_ref().map(serde_json::to_value) {
            Some(Ok(filters)) => params.with(FILTERS, filters),
            _ => params,
        }
    }

    fn validate_params(&self, params: &NodeParams) -> Result<(), DomainError> {
        params.get_top_k(TOP_K)?;
        if let Some(filters) = params.get::<MetadataFilter>(FILTERS)? {
            filters.validate()?;
        }
        Ok(())
    }

    async fn run(&self, input: &NodeInput, params: &NodeParams) -> Result<NodeOutput, DomainError> {
        let top_k = params
            .get_top_k(TOP_K)?
            .unwrap_or(self.retriever.default_top_k());
        let filters: Option<MetadataFilter> = params.get(FILTERS)?;

        let documents = self
            .retriever
            .retrieve(&input.query, top_k, filters.as_ref())
            .await?;

        Ok(NodeOutput::from_documents(documents).with_param(TOP_K, json!(top_k)))
    }
}

/// Extracts answers from the documents of every predecessor. Params: `top_k`.
#[derive(Debug, Clone)]
pub struct ReaderNode {
    reader: Reader,
}

impl ReaderNode {
    pub fn new(reader: Reader) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl PipelineNode for ReaderNode {
    fn component_type(&self) -> &'static str {
        "reader"
    }

    fn default_params(&self) -> NodeParams {
        NodeParams::new().with(TOP_K, json!(self.reader.config().top_k))
    }

    fn produces_answers(&self) -> bool {
        true
    }

    fn validate_params(&self, params: &NodeParams) -> Result<(), DomainError> {
        params.get_top_k(TOP_K).map(|_| ())
    }

    async fn run(&self, input: &NodeInput, params: &NodeParams) -> Result<NodeOutput, DomainError> {
        let top_k = params
            .get_top_k(TOP_K)?
            .unwrap_or(self.reader.config().top_k);

        let mut seen = HashSet::new();
        let documents: Vec<Document> = input
            .documents()
            .filter(|scored| seen.insert(scored.id().to_string()))
            .map(|scored| scored.document.clone())
            .collect();

        let answers = self.reader.read(&input.query, &documents, top_k).await?;
        Ok(NodeOutput::from_answers(answers).with_param(TOP_K, json!(top_k)))
    }
}

/// Merges predecessor document lists, keeping the best score per document.
/// Params: optional `top_k`.
#[derive(Debug, Clone, Default)]
pub struct JoinDocumentsNode {
    top_k: Option<usize>,
}

impl JoinDocumentsNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_top_k(top_k: usize) -> Self {
        Self { top_k: Some(top_k) }
    }
}

#[async_trait]
impl PipelineNode for JoinDocumentsNode {
    fn component_type(&self) -> &'static str {
        "join_documents"
    }

    fn default_params(&self) -> NodeParams {
        match self.top_k {
            Some(top_k) => NodeParams::new().with(TOP_K, json!(top_k)),
            None => NodeParams::new(),
        }
    }

    fn validate_params(&self, params: &NodeParams) -> Result<(), DomainError> {
        params.get_top_k(TOP_K).map(|_| ())
    }

    async fn run(&self, input: &NodeInput, params: &NodeParams) -> Result<NodeOutput, DomainError> {
        let top_k = params.get_top_k(TOP_K)?;

        let mut merged: Vec<ScoredDocument> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for scored in input.documents() {
            match index.get(scored.id()) {
                Some(&position) => {
                    if scored.score > merged[position].score {
                        merged[position] = scored.clone();
                    }
                }
                None => {
                    index.insert(scored.id().to_string(), merged.len());
                    merged.push(scored.clone());
                }
            }
        }

        // Stable: equal scores keep first-appearance order
        merged.sort_by(|a, b| b.score.total_cmp(&a.score));
        if let Some(top_k) = top_k {
            merged.truncate(top_k);
        }

        Ok(NodeOutput::from_documents(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::{Answer, FilterBuilder, Span};
    use crate::domain::pipeline::PredecessorOutput;
    use crate::domain::reading::MockReadingScorer;
    use crate::domain::store::{DocumentStore, DuplicatePolicy};
    use crate::infrastructure::retrieval::Bm25Scorer;
    use crate::infrastructure::store::InMemoryDocumentStore;
    use std::sync::Arc;

    fn scored(id: &str, score: f32) -> ScoredDocument {
        ScoredDocument::new(Document::new(id, format!("content of {}", id)), score)
    }

    fn input(lists: Vec<(&str, Vec<ScoredDocument>)>) -> NodeInput {
        NodeInput::new(
            "q",
            lists
                .into_iter()
                .map(|(node, docs)| PredecessorOutput {
                    node: node.to_string(),
                    output: NodeOutput::from_documents(docs),
                })
                .collect(),
        )
    }

    async fn retriever() -> Retriever {
        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .write_documents(
                vec![
                    Document::new("d1", "paris france").with_metadata("lang", json!("fr")),
                    Document::new("d2", "paris texas").with_metadata("lang", json!("en")),
                    Document::new("d3", "berlin").with_metadata("lang", json!("de")),
                ],
                DuplicatePolicy::Overwrite,
            )
            .await
            .unwrap();
        Retriever::new(Arc::new(Bm25Scorer::new()), store).with_default_top_k(2).unwrap()
    }

    #[tokio::test]
    async fn test_retriever_node_uses_params() {
        let node = RetrieverNode::new(retriever().await);
        assert_eq!(node.default_params().get_raw(TOP_K), Some(&json!(2)));

        let output = node
            .run(&input(Vec::new()), &node.default_params())
            .await
            .unwrap();
        assert_eq!(output.documents().count(), 2);

        let filter = FilterBuilder::new().eq("lang", "en").build().unwrap();
        let params = node
            .default_params()
            .merged(Some(&NodeParams::new().with(FILTERS, serde_json::to_value(&filter).unwrap())));
        let output = node.run(&input(Vec::new()), &params).await.unwrap();
        let ids: Vec<&str> = output.documents().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["d2"]);
    }

    #[tokio::test]
    async fn test_retriever_node_rejects_zero_top_k() {
        let node = RetrieverNode::new(retriever().await);
        let err = node
            .run(&input(Vec::new()), &NodeParams::new().with(TOP_K, json!(0)))
            .await
            .unwrap_err();
        assert!(err.is_configuration());

        let zero = NodeParams::new().with(TOP_K, json!(0));
        assert!(node.validate_params(&zero).unwrap_err().is_configuration());
        let bad_filter = NodeParams::new().with(FILTERS, json!({"conditions": "oops"}));
        assert!(node.validate_params(&bad_filter).is_err());
        assert!(node.validate_params(&node.default_params()).is_ok());
        assert!(!node.produces_answers());
    }

    #[tokio::test]
    async fn test_reader_node_dedups_documents_across_predecessors() {
        let mut scorer = MockReadingScorer::new();
        scorer
            .expect_score()
            .withf(|_, documents, _| {
                documents.iter().map(|d| d.id.as_str()).collect::<Vec<_>>() == ["a", "b", "c"]
            })
            .returning(|_, documents, _| {
                Ok(vec![Answer::new("x", documents[0].id.clone(), Span::new(0, 1), 0.9)])
            });
        scorer.expect_scorer_name().return_const("mock");

        let node = ReaderNode::new(Reader::new(Arc::new(scorer)));
        let output = node
            .run(
                &input(vec![
                    ("A", vec![scored("a", 0.3), scored("b", 0.2)]),
                    ("C", vec![scored("b", 0.9), scored("c", 0.1)]),
                ]),
                &node.default_params(),
            )
            .await
            .unwrap();

        assert_eq!(output.answers().count(), 1);
        assert_eq!(output.params[TOP_K], json!(3));
    }

    #[tokio::test]
    async fn test_join_keeps_best_score_and_first_appearance_ties() {
        let node = JoinDocumentsNode::new();
        let output = node
            .run(
                &input(vec![
                    ("A", vec![scored("a", 0.5), scored("b", 0.2)]),
                    ("C", vec![scored("b", 0.7), scored("c", 0.5)]),
                ]),
                &node.default_params(),
            )
            .await
            .unwrap();

        let ranked: Vec<(&str, f32)> = output.documents().map(|d| (d.id(), d.score)).collect();
        assert_eq!(ranked, vec![("b", 0.7), ("a", 0.5), ("c", 0.5)]);

        let node = JoinDocumentsNode::with_top_k(1);
        let output = node
            .run(&input(vec![("A", vec![scored("a", 0.5), scored("b", 0.9)])]), &node.default_params())
            .await
            .unwrap();
        assert_eq!(output.documents().count(), 1);
    }
}
