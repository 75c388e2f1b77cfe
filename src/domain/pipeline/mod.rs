//! Pipeline domain module
//!
//! A pipeline is a directed acyclic graph of components. Every node declares
//! an ordered list of predecessors; the single root receives the external
//! query. Graphs are validated when built:
//! - every declared predecessor exists
//! - there are no cycles
//! - every node is reachable from the root
//!
//! Per-call parameters are keyed by node name and overlay that node's
//! defaults for the one execution only.

mod error;
mod executor;
mod graph;
mod node;
mod params;

pub use error::PipelineError;
pub use executor::{NodeTrace, PipelineExecutor, PipelineRun};
pub use graph::{Pipeline, PipelineBuilder, DEFAULT_ROOT};
pub use node::{NodeInput, NodeItem, NodeOutput, PipelineNode, PredecessorOutput, QueryNode};
pub use params::{NodeParams, RuntimeParams};
