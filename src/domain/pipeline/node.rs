//! Node interface and the values passed along pipeline edges

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::params::NodeParams;
use crate::domain::document::{Answer, ScoredDocument};
use crate::domain::DomainError;

/// One element of a node's ordered output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeItem {
    Document(ScoredDocument),
    Answer(Answer),
}

/// Result a node produces for one query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    pub items: Vec<NodeItem>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl NodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_documents(documents: Vec<ScoredDocument>) -> Self {
        Self {
            items: documents.into_iter().map(NodeItem::Document).collect(),
            params: Map::new(),
        }
    }

    pub fn from_answers(answers: Vec<Answer>) -> Self {
        Self {
            items: answers.into_iter().map(NodeItem::Answer).collect(),
            params: Map::new(),
        }
    }

    /// Attach a value to the parameter bag
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn documents(&self) -> impl Iterator<Item = &ScoredDocument> {
        self.items.iter().filter_map(|item| match item {
            NodeItem::Document(doc) => Some(doc),
            NodeItem::Answer(_) => None,
        })
    }

    pub fn answers(&self) -> impl Iterator<Item = &Answer> {
        self.items.iter().filter_map(|item| match item {
            NodeItem::Answer(answer) => Some(answer),
            NodeItem::Document(_) => None,
        })
    }

    pub fn has_documents(&self) -> bool {
        self.documents().next().is_some()
    }

    pub fn has_answers(&self) -> bool {
        self.answers().next().is_some()
    }
}

/// Output of one predecessor, tagged with its node name
#[derive(Debug, Clone, PartialEq)]
pub struct PredecessorOutput {
    pub node: String,
    pub output: NodeOutput,
}

/// Everything a node receives for one query
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInput {
    pub query: String,
    /// Predecessor outputs in declared edge order
    pub inputs: Vec<PredecessorOutput>,
}

impl NodeInput {
    pub fn new(query: impl Into<String>, inputs: Vec<PredecessorOutput>) -> Self {
        Self {
            query: query.into(),
            inputs,
        }
    }

    /// All predecessor documents, in edge order then output order
    pub fn documents(&self) -> impl Iterator<Item = &ScoredDocument> {
        self.inputs.iter().flat_map(|p| p.output.documents())
    }

    pub fn predecessor_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|p| p.node.as_str()).collect()
    }
}

/// A component that can be wired into a pipeline graph
#[async_trait]
pub trait PipelineNode: Send + Sync + Debug {
    /// Short label for the component kind (e.g. "retriever")
    fn component_type(&self) -> &'static str;

    /// Parameters used when a call supplies no override
    fn default_params(&self) -> NodeParams {
        NodeParams::new()
    }

    /// Whether the node emits answer spans rather than documents
    fn produces_answers(&self) -> bool {
        false
    }

    /// Reject parameters the node could never run with
    fn validate_params(&self, _params: &NodeParams) -> Result<(), DomainError> {
        Ok(())
    }

    /// Process one query. Blocking model or store calls happen in here.
    async fn run(&self, input: &NodeInput, params: &NodeParams) -> Result<NodeOutput, DomainError>;
}

/// The root node: forwards the query with an empty output
#[derive(Debug, Clone, Default)]
pub struct QueryNode;

#[async_trait]
impl PipelineNode for QueryNode {
    fn component_type(&self) -> &'static str {
        "query"
    }

    async fn run(&self, input: &NodeInput, _params: &NodeParams) -> Result<NodeOutput, DomainError> {
        Ok(NodeOutput::new().with_param("query", Value::String(input.query.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::{Document, Span};

    #[test]
    fn test_output_accessors() {
        let output = NodeOutput {
            items: vec![
                NodeItem::Document(ScoredDocument::new(Document::new("d1", "a"), 0.5)),
                NodeItem::Answer(Answer::new("a", "d1", Span::new(0, 1), 0.9)),
            ],
            params: Map::new(),
        };

        assert_eq!(output.documents().count(), 1);
        assert_eq!(output.answers().count(), 1);
        assert!(output.has_documents());
        assert!(output.has_answers());
    }

    #[test]
    fn test_input_documents_follow_edge_order() {
        let input = NodeInput::new(
            "q",
            vec![
                PredecessorOutput {
                    node: "A".to_string(),
                    output: NodeOutput::from_documents(vec![ScoredDocument::new(
                        Document::new("a1", "x"),
                        0.1,
                    )]),
                },
                PredecessorOutput {
                    node: "C".to_string(),
                    output: NodeOutput::from_documents(vec![ScoredDocument::new(
                        Document::new("c1", "y"),
                        0.9,
                    )]),
                },
            ],
        );

        let ids: Vec<&str> = input.documents().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["a1", "c1"]);
        assert_eq!(input.predecessor_names(), vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_query_node_forwards_query() {
        let output = QueryNode
            .run(&NodeInput::new("who?", Vec::new()), &NodeParams::new())
            .await
            .unwrap();

        assert!(output.items.is_empty());
        assert_eq!(output.params.get("query"), Some(&Value::String("who?".into())));
    }

    #[test]
    fn test_item_serialization_is_tagged() {
        let item = NodeItem::Answer(Answer::no_answer(0.2));
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "answer");
    }
}
