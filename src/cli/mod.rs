//! CLI module for the QA pipeline
//!
//! Subcommands:
//! - `evaluate`: evaluate a BM25 retrieval pipeline against labelled queries
//! - `metrics`: recompute metrics from a saved evaluation result

pub mod evaluate;
pub mod metrics;

use clap::{Parser, Subcommand};

/// Retrieval QA pipeline evaluation
#[derive(Parser)]
#[command(name = "qa-pipeline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a Query -> Retriever pipeline over a corpus and report metrics
    Evaluate(evaluate::EvaluateArgs),

    /// Print metrics of a saved evaluation result
    Metrics(metrics::MetricsArgs),
}
