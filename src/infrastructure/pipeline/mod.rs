//! Pipeline infrastructure implementations

mod executor_impl;
mod nodes;

pub use executor_impl::PipelineExecutorImpl;
pub use nodes::{JoinDocumentsNode, ReaderNode, RetrieverNode};
