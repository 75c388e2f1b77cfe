//! Pipeline executor trait and run result types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::PipelineError;
use super::graph::Pipeline;
use super::node::NodeOutput;
use super::params::RuntimeParams;

/// Output of one completed node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTrace {
    pub node: String,
    pub output: NodeOutput,
    pub execution_time_ms: u64,
}

impl NodeTrace {
    pub fn new(node: impl Into<String>, output: NodeOutput, execution_time_ms: u64) -> Self {
        Self {
            node: node.into(),
            output,
            execution_time_ms,
        }
    }
}

/// Result of running one query through a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub query: String,
    /// Completed nodes in execution order
    pub traces: Vec<NodeTrace>,
    pub execution_time_ms: u64,
}

impl PipelineRun {
    pub fn output(&self, node: &str) -> Option<&NodeOutput> {
        self.traces
            .iter()
            .find(|t| t.node == node)
            .map(|t| &t.output)
    }

    /// Output of the last node executed
    pub fn final_output(&self) -> Option<&NodeOutput> {
        self.traces.last().map(|t| &t.output)
    }

    pub fn executed_nodes(&self) -> Vec<&str> {
        self.traces.iter().map(|t| t.node.as_str()).collect()
    }
}

/// Trait for pipeline execution
#[async_trait]
pub trait PipelineExecutor: Send + Sync + std::fmt::Debug {
    /// Run one query through `pipeline` with per-call parameter overrides
    async fn run(
        &self,
        pipeline: &Pipeline,
        query: &str,
        params: &RuntimeParams,
    ) -> Result<PipelineRun, PipelineError>;
}
