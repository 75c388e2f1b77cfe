//! Metrics command - recompute metrics from a saved evaluation result

use std::path::PathBuf;

use clap::Args;
use serde_json::json;

use crate::domain::EvaluationResult;

#[derive(Args, Debug)]
pub struct MetricsArgs {
    /// Directory written by `evaluate --output`
    #[arg(long)]
    pub input: PathBuf,

    /// Simulate a shallower ranking depth
    #[arg(long)]
    pub top_k: Option<usize>,
}

pub async fn run(args: MetricsArgs) -> anyhow::Result<()> {
    let result = EvaluationResult::load(&args.input)?;

    let report = json!({
        "created_at": result.created_at,
        "metrics": result.calculate_metrics_at(args.top_k),
        "failures": result.failures().len(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
