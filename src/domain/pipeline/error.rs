//! Pipeline error types

use thiserror::Error;

use super::executor::NodeTrace;
use crate::domain::DomainError;

/// Errors raised while building or running a pipeline
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("Duplicate node name: {0}")]
    DuplicateNode(String),

    #[error("Invalid root: {0}")]
    InvalidRoot(String),

    #[error("Node '{node}' declares unknown predecessor '{predecessor}'")]
    UnknownPredecessor { node: String, predecessor: String },

    #[error("Cycle detected among nodes: {0}")]
    Cycle(String),

    #[error("Node '{0}' is not reachable from the root")]
    Unreachable(String),

    #[error("Runtime parameters given for unknown node '{0}'")]
    UnknownNodeParams(String),

    #[error("Invalid parameters for node '{node}': {cause}")]
    InvalidParams { node: String, cause: DomainError },

    #[error("Node '{node}' failed: {cause}")]
    NodeExecution {
        node: String,
        cause: DomainError,
        trace: Vec<NodeTrace>,
    },

    #[error("Execution cancelled before node '{node}'")]
    Cancelled { node: String, trace: Vec<NodeTrace> },
}

impl PipelineError {
    pub fn duplicate_node(name: impl Into<String>) -> Self {
        Self::DuplicateNode(name.into())
    }

    pub fn invalid_root(message: impl Into<String>) -> Self {
        Self::InvalidRoot(message.into())
    }

    pub fn unknown_predecessor(node: impl Into<String>, predecessor: impl Into<String>) -> Self {
        Self::UnknownPredecessor {
            node: node.into(),
            predecessor: predecessor.into(),
        }
    }

    pub fn cycle(nodes: &[String]) -> Self {
        Self::Cycle(nodes.join(", "))
    }

    pub fn unreachable(node: impl Into<String>) -> Self {
        Self::Unreachable(node.into())
    }

    pub fn unknown_node_params(node: impl Into<String>) -> Self {
        Self::UnknownNodeParams(node.into())
    }

    pub fn invalid_params(node: impl Into<String>, cause: DomainError) -> Self {
        Self::InvalidParams {
            node: node.into(),
            cause,
        }
    }

    pub fn node_execution(node: impl Into<String>, cause: DomainError, trace: Vec<NodeTrace>) -> Self {
        Self::NodeExecution {
            node: node.into(),
            cause,
            trace,
        }
    }

    pub fn cancelled(node: impl Into<String>, trace: Vec<NodeTrace>) -> Self {
        Self::Cancelled {
            node: node.into(),
            trace,
        }
    }

    /// Whether the error was raised before any node ran
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Self::NodeExecution { .. } | Self::Cancelled { .. })
    }

    /// Name of the node the error is attributed to, if any
    pub fn node(&self) -> Option<&str> {
        match self {
            Self::NodeExecution { node, .. }
            | Self::Cancelled { node, .. }
            | Self::InvalidParams { node, .. } => Some(node),
            _ => None,
        }
    }

    /// Outputs of the nodes that completed before the failure
    pub fn trace(&self) -> &[NodeTrace] {
        match self {
            Self::NodeExecution { trace, .. } | Self::Cancelled { trace, .. } => trace,
            _ => &[],
        }
    }
}
