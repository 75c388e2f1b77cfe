//! Evaluate command - end-to-end evaluation of a BM25 retrieval pipeline

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::info;

use crate::config::AppConfig;
use crate::domain::{Document, DocumentStore, DuplicatePolicy, Label, Pipeline, RuntimeParams};
use crate::infrastructure::evaluation::Evaluator;
use crate::infrastructure::logging;
use crate::infrastructure::pipeline::{PipelineExecutorImpl, RetrieverNode};
use crate::infrastructure::retrieval::{Bm25Scorer, Retriever};
use crate::infrastructure::store::InMemoryDocumentStore;

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// JSON array of documents
    #[arg(long)]
    pub corpus: PathBuf,

    /// JSON array of labels
    #[arg(long)]
    pub labels: PathBuf,

    /// Documents retrieved per query (defaults to retriever.top_k)
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Directory to save the evaluation result into
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub async fn run(args: EvaluateArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    config.validate()?;
    logging::init_logging(&config.logging)?;

    let documents: Vec<Document> = read_json(&args.corpus)?;
    let labels: Vec<Label> = read_json(&args.labels)?;

    let store = Arc::new(InMemoryDocumentStore::new());
    store
        .write_documents(documents, DuplicatePolicy::Fail)
        .await
        .context("failed to load corpus")?;
    store.write_labels(labels).await?;

    let multilabels = store
        .get_all_labels_aggregated(config.evaluation.drop_negative, config.evaluation.drop_no_answer)
        .await?;
    info!(
        documents = store.document_count().await?,
        queries = multilabels.len(),
        "Loaded evaluation data"
    );

    let top_k = args.top_k.unwrap_or(config.retriever.top_k);
    let retriever = Retriever::new(
        Arc::new(Bm25Scorer::with_config(config.retriever.bm25)),
        store.clone(),
    )
    .with_default_top_k(top_k)?;

    let pipeline = Pipeline::builder()
        .add_node("Retriever", Arc::new(RetrieverNode::new(retriever)), &["Query"])
        .build()?;

    let result = Evaluator::new()
        .with_concurrency(config.evaluation.concurrency)
        .evaluate_pipeline(
            &pipeline,
            &PipelineExecutorImpl::new(),
            &multilabels,
            &RuntimeParams::new(),
        )
        .await?;

    let report = json!({
        "metrics": result.calculate_metrics(),
        "failures": result.failures(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(output) = args.output {
        result.save(&output)?;
        info!(path = %output.display(), "Evaluation result saved");
    }

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("failed to parse {}", path.display()))
}
