//! Retrieval QA pipeline core
//!
//! - A DAG executor wiring retrievers, readers and custom nodes per query
//! - Rank-aware evaluation of retrieval and answer extraction
//! - Pseudo-label generation for adapting a retriever to a new corpus

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
