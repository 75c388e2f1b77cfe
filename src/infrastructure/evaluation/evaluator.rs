//! Evaluator: runs components or whole pipelines against aggregated labels
//! and records one ranked table per node.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::domain::comparator::Comparator;
use crate::domain::document::{Answer, MetadataFilter, ScoredDocument};
use crate::domain::evaluation::{
    matches_any, EvaluationResult, EvaluationRow, NodeKind, QueryFailure, QueryGold,
};
use crate::domain::label::MultiLabel;
use crate::domain::pipeline::{NodeOutput, Pipeline, PipelineError, PipelineExecutor, RuntimeParams};
use crate::domain::store::DocumentStore;
use crate::domain::DomainError;
use crate::infrastructure::reading::Reader;
use crate::infrastructure::retrieval::Retriever;

/// Table name used for component-isolated retriever runs
pub const RETRIEVER_NODE: &str = "Retriever";
/// Table name used for component-isolated reader runs
pub const READER_NODE: &str = "Reader";

const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct Evaluator {
    comparator: Option<Arc<dyn Comparator>>,
    concurrency: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one query inside a batch
enum QueryOutcome {
    Tables(Vec<(String, NodeKind, usize, QueryGold, Vec<EvaluationRow>)>),
    Failed(QueryFailure),
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            comparator: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Enable semantic answer similarity
    pub fn with_comparator(mut self, comparator: Arc<dyn Comparator>) -> Self {
        self.comparator = Some(comparator);
        self
    }

    /// Number of queries evaluated concurrently; results keep label order
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Judge the retriever alone, document-level
    pub async fn evaluate_retriever(
        &self,
        retriever: &Retriever,
        labels: &[MultiLabel],
        top_k: usize,
        filters: Option<&MetadataFilter>,
    ) -> Result<EvaluationResult, DomainError> {
        if top_k == 0 {
            return Err(DomainError::configuration("top_k must be a positive integer"));
        }
        if let Some(filters) = filters {
            filters.validate()?;
        }

        info!(queries = labels.len(), top_k, "Evaluating retriever");

        let outcomes = self
            .run_batched(labels, |label| async move {
                let gold = query_gold(label);
                match retriever.retrieve(label.query(), top_k, filters).await {
                    Ok(documents) => {
                        let rows = retrieval_rows(label.query(), &documents, &gold.gold_document_ids);
                        QueryOutcome::Tables(vec![(
                            RETRIEVER_NODE.to_string(),
                            NodeKind::Retrieval,
                            top_k,
                            gold,
                            rows,
                        )])
                    }
                    Err(e) => QueryOutcome::Failed(failure(label.query(), RETRIEVER_NODE, &e)),
                }
            })
            .await;

        Ok(assemble(outcomes))
    }

    /// Judge the reader alone, span-level, over each query's gold documents
    pub async fn evaluate_reader(
        &self,
        reader: &Reader,
        store: &dyn DocumentStore,
        labels: &[MultiLabel],
        top_k: usize,
    ) -> Result<EvaluationResult, DomainError> {
        if top_k == 0 {
            return Err(DomainError::configuration("top_k must be a positive integer"));
        }

        info!(queries = labels.len(), top_k, "Evaluating reader");

        let outcomes = self
            .run_batched(labels, |label| async move {
                let gold = query_gold(label);
                match self.read_on_gold(reader, store, &gold, top_k).await {
                    Ok(rows) => QueryOutcome::Tables(vec![(
                        READER_NODE.to_string(),
                        NodeKind::Reading,
                        top_k,
                        gold,
                        rows,
                    )]),
                    Err(e) => QueryOutcome::Failed(failure(label.query(), READER_NODE, &e)),
                }
            })
            .await;

        Ok(assemble(outcomes))
    }

    /// Run the full pipeline per query and judge every non-root node
    pub async fn evaluate_pipeline(
        &self,
        pipeline: &Pipeline,
        executor: &dyn PipelineExecutor,
        labels: &[MultiLabel],
        params: &RuntimeParams,
    ) -> Result<EvaluationResult, PipelineError> {
        pipeline.validate_params(params)?;

        info!(queries = labels.len(), nodes = pipeline.len(), "Evaluating pipeline");

        let outcomes = self
            .run_batched(labels, |label| async move {
                let run = match executor.run(pipeline, label.query(), params).await {
                    Ok(run) => run,
                    Err(e) => {
                        let cause = match &e {
                            PipelineError::NodeExecution { cause, .. } => cause.to_string(),
                            other => other.to_string(),
                        };
                        return QueryOutcome::Failed(QueryFailure {
                            query: label.query().to_string(),
                            node: e.node().map(str::to_string),
                            message: cause,
                        });
                    }
                };

                let gold = query_gold(label);
                let mut tables = Vec::new();
                for trace in run.traces.iter().filter(|t| t.node != pipeline.root()) {
                    let produces_answers = pipeline
                        .component(&trace.node)
                        .is_some_and(|c| c.produces_answers());
                    let kind = if produces_answers {
                        NodeKind::Reading
                    } else {
                        NodeKind::Retrieval
                    };

                    let rows = match kind {
                        NodeKind::Retrieval => {
                            let documents: Vec<ScoredDocument> = trace.output.documents().cloned().collect();
                            retrieval_rows(label.query(), &documents, &gold.gold_document_ids)
                        }
                        NodeKind::Reading => {
                            let answers: Vec<Answer> = trace.output.answers().cloned().collect();
                            match self.reading_rows(label.query(), &answers, &gold.gold_answers).await {
                                Ok(rows) => rows,
                                Err(e) => {
                                    return QueryOutcome::Failed(failure(label.query(), &trace.node, &e));
                                }
                            }
                        }
                    };

                    tables.push((trace.node.clone(), kind, output_depth(&trace.output), gold.clone(), rows));
                }

                QueryOutcome::Tables(tables)
            })
            .await;

        Ok(assemble(outcomes))
    }

    /// Evaluate queries `concurrency` at a time; outcomes keep label order
    async fn run_batched<'a, F, Fut>(
        &self,
        labels: &'a [MultiLabel],
        evaluate: F,
    ) -> Vec<QueryOutcome>
    where
        F: Fn(&'a MultiLabel) -> Fut,
        Fut: Future<Output = QueryOutcome>,
    {
        let mut outcomes = Vec::with_capacity(labels.len());
        for batch in labels.chunks(self.concurrency) {
            outcomes.extend(join_all(batch.iter().map(&evaluate)).await);
        }
        outcomes
    }

    async fn read_on_gold(
        &self,
        reader: &Reader,
        store: &dyn DocumentStore,
        gold: &QueryGold,
        top_k: usize,
    ) -> Result<Vec<EvaluationRow>, DomainError> {
        let documents = store.get_documents_by_ids(&gold.gold_document_ids).await?;
        let answers = reader.read(&gold.query, &documents, top_k).await?;
        self.reading_rows(&gold.query, &answers, &gold.gold_answers).await
    }

    async fn reading_rows(
        &self,
        query: &str,
        answers: &[Answer],
        gold_answers: &[String],
    ) -> Result<Vec<EvaluationRow>, DomainError> {
        let mut rows = Vec::with_capacity(answers.len());

        for (i, answer) in answers.iter().enumerate() {
            let sas = match (&self.comparator, i) {
                (Some(comparator), 0) if !gold_answers.is_empty() => {
                    Some(best_similarity(comparator.as_ref(), &answer.text, gold_answers).await?)
                }
                _ => None,
            };

            rows.push(EvaluationRow {
                query: query.to_string(),
                rank: i + 1,
                document_id: answer.document_id.clone(),
                answer: Some(answer.text.clone()),
                gold_match: matches_any(&answer.text, gold_answers),
                score: f64::from(answer.confidence),
                sas,
            });
        }

        Ok(rows)
    }
}

async fn best_similarity(
    comparator: &dyn Comparator,
    prediction: &str,
    gold_answers: &[String],
) -> Result<f64, DomainError> {
    let mut best = f64::MIN;
    for gold in gold_answers {
        best = best.max(f64::from(comparator.score(prediction, gold).await?));
    }
    Ok(best)
}

fn query_gold(label: &MultiLabel) -> QueryGold {
    QueryGold {
        query: label.query().to_string(),
        gold_document_ids: label.gold_document_ids(),
        gold_answers: label.gold_answers(),
    }
}

fn retrieval_rows(query: &str, documents: &[ScoredDocument], gold_ids: &[String]) -> Vec<EvaluationRow> {
    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| EvaluationRow {
            query: query.to_string(),
            rank: i + 1,
            document_id: Some(doc.id().to_string()),
            answer: None,
            gold_match: gold_ids.iter().any(|id| id == doc.id()),
            score: f64::from(doc.score),
            sas: None,
        })
        .collect()
}

/// Depth a node was run at: its reported `top_k`, else its output length
fn output_depth(output: &NodeOutput) -> usize {
    output
        .params
        .get("top_k")
        .and_then(|v| v.as_u64())
        .map(|k| k as usize)
        .unwrap_or(output.items.len())
        .max(1)
}

fn failure(query: &str, node: &str, error: &DomainError) -> QueryFailure {
    warn!(query = %query, node = %node, error = %error, "Query evaluation failed");
    QueryFailure {
        query: query.to_string(),
        node: Some(node.to_string()),
        message: error.to_string(),
    }
}

/// Fold per-query outcomes into one result, in label order
fn assemble(outcomes: Vec<QueryOutcome>) -> EvaluationResult {
    let mut result = EvaluationResult::new();

    for outcome in outcomes {
        match outcome {
            QueryOutcome::Tables(tables) => {
                for (node, kind, top_k, gold, rows) in tables {
                    let table = result.node_mut(&node, kind, top_k);
                    table.top_k = table.top_k.max(top_k);
                    table.push_query(gold, rows);
                }
            }
            QueryOutcome::Failed(failure) => result.record_failure(failure),
        }
    }

    info!(
        nodes = result.nodes().count(),
        failures = result.failures().len(),
        "Evaluation finished"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::comparator::MockComparator;
    use crate::domain::document::{Document, Span};
    use crate::domain::label::{Label, LabelAggregator};
    use crate::domain::pipeline::{NodeInput, NodeParams, PipelineNode};
    use crate::domain::reading::MockReadingScorer;
    use crate::domain::retrieval::MockRetrievalScorer;
    use crate::domain::store::DuplicatePolicy;
    use crate::infrastructure::pipeline::{PipelineExecutorImpl, ReaderNode, RetrieverNode};
    use crate::infrastructure::reading::ReaderConfig;
    use crate::infrastructure::store::InMemoryDocumentStore;
    use async_trait::async_trait;
    use serde_json::json;

    /// Answers only the query "Q2"
    #[derive(Debug)]
    struct LateAnswerNode;

    #[async_trait]
    impl PipelineNode for LateAnswerNode {
        fn component_type(&self) -> &'static str {
            "late_answer"
        }

        fn produces_answers(&self) -> bool {
            true
        }

        async fn run(&self, input: &NodeInput, _params: &NodeParams) -> Result<NodeOutput, DomainError> {
            if input.query != "Q2" {
                return Ok(NodeOutput::new());
            }
            Ok(NodeOutput::from_answers(vec![Answer::new(
                "Berlin",
                "D2",
                Span::new(0, 6),
                0.8,
            )]))
        }
    }

    async fn store() -> Arc<InMemoryDocumentStore> {
        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .write_documents(
                vec![
                    Document::new("D1", "Paris is the capital of France."),
                    Document::new("D2", "Berlin is the capital of Germany."),
                    Document::new("D3", "Madrid is the capital of Spain."),
                ],
                DuplicatePolicy::Overwrite,
            )
            .await
            .unwrap();
        store
    }

    fn labels() -> Vec<MultiLabel> {
        LabelAggregator::new(true, false).aggregate(vec![Label::new("Q1", "D1")
            .with_answer(Answer::new("Paris", "D1", Span::new(0, 5), 1.0))])
    }

    /// Scores D1 0.9, D2 0.5, D3 0.1, or fails for the query "broken"
    fn fixed_scorer() -> MockRetrievalScorer {
        let mut scorer = MockRetrievalScorer::new();
        scorer.expect_score().returning(|query, corpus, _| {
            if query == "broken" {
                return Err(DomainError::adapter("scorer", "unavailable"));
            }
            Ok(corpus
                .iter()
                .map(|doc| {
                    let score = match doc.id.as_str() {
                        "D1" => 0.9,
                        "D2" => 0.5,
                        _ => 0.1,
                    };
                    ScoredDocument::new(doc.clone(), score)
                })
                .collect())
        });
        scorer.expect_scorer_name().return_const("fixed");
        scorer
    }

    fn paris_reader() -> MockReadingScorer {
        let mut scorer = MockReadingScorer::new();
        scorer.expect_score().returning(|_, documents, _| {
            Ok(documents
                .iter()
                .filter(|d| d.content.starts_with("Paris"))
                .map(|d| Answer::new("Paris", d.id.clone(), Span::new(0, 5), 0.95))
                .collect())
        });
        scorer.expect_scorer_name().return_const("paris");
        scorer
    }

    #[tokio::test]
    async fn test_retriever_scenario() {
        let retriever = Retriever::new(Arc::new(fixed_scorer()), store().await);
        let result = Evaluator::new()
            .evaluate_retriever(&retriever, &labels(), 3, None)
            .await
            .unwrap();

        let metrics = result.calculate_metrics();
        let retrieval = metrics[RETRIEVER_NODE].as_retrieval().unwrap();
        assert_eq!(retrieval.recall_single_hit, Some(1.0));
        assert_eq!(retrieval.mrr, Some(1.0));
        assert!((retrieval.precision.unwrap() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_reader_scenario_on_gold_documents() {
        let store = store().await;
        let reader = Reader::new(Arc::new(paris_reader()));

        let result = Evaluator::new()
            .evaluate_reader(&reader, store.as_ref(), &labels(), 3)
            .await
            .unwrap();

        let metrics = result.calculate_metrics();
        let reading = metrics[READER_NODE].as_reading().unwrap();
        assert_eq!(reading.exact_match, Some(1.0));
        assert_eq!(reading.f1, Some(1.0));
        assert_eq!(reading.sas, None);
    }

    #[tokio::test]
    async fn test_sas_uses_comparator() {
        let mut comparator = MockComparator::new();
        comparator
            .expect_score()
            .returning(|a, b| Ok(if a == b { 1.0 } else { 0.25 }));
        comparator.expect_comparator_name().return_const("mock");

        let store = store().await;
        let reader = Reader::new(Arc::new(paris_reader()));
        let result = Evaluator::new()
            .with_comparator(Arc::new(comparator))
            .evaluate_reader(&reader, store.as_ref(), &labels(), 3)
            .await
            .unwrap();

        let metrics = result.calculate_metrics();
        assert_eq!(metrics[READER_NODE].as_reading().unwrap().sas, Some(1.0));
    }

    #[tokio::test]
    async fn test_failed_query_recorded_and_run_continues() {
        let mut labels = labels();
        labels.extend(
            LabelAggregator::new(true, false).aggregate(vec![Label::new("broken", "D2")]),
        );

        let retriever = Retriever::new(Arc::new(fixed_scorer()), store().await);
        let result = Evaluator::new()
            .with_concurrency(2)
            .evaluate_retriever(&retriever, &labels, 2, None)
            .await
            .unwrap();

        assert_eq!(result.failures().len(), 1);
        assert_eq!(result.failures()[0].query, "broken");
        let table = result.node(RETRIEVER_NODE).unwrap();
        assert_eq!(table.queries.len(), 1);
    }

    #[tokio::test]
    async fn test_pipeline_evaluation_judges_every_node() {
        let store = store().await;
        let retriever = Retriever::new(Arc::new(fixed_scorer()), store).with_default_top_k(2).unwrap();
        let reader = Reader::with_config(Arc::new(paris_reader()), ReaderConfig::default());

        let pipeline = Pipeline::builder()
            .add_node("Retriever", Arc::new(RetrieverNode::new(retriever)), &["Query"])
            .add_node("Reader", Arc::new(ReaderNode::new(reader)), &["Retriever"])
            .build()
            .unwrap();

        let result = Evaluator::new()
            .evaluate_pipeline(&pipeline, &PipelineExecutorImpl::new(), &labels(), &RuntimeParams::new())
            .await
            .unwrap();

        assert!(result.node("Query").is_none());
        let metrics = result.calculate_metrics();
        let retrieval = metrics["Retriever"].as_retrieval().unwrap();
        assert_eq!(retrieval.top_k, 2);
        assert_eq!(retrieval.precision, Some(0.5));
        let reading = metrics["Reader"].as_reading().unwrap();
        assert_eq!(reading.exact_match, Some(1.0));
        assert_eq!(reading.n, 3);
    }

    #[tokio::test]
    async fn test_pipeline_rejects_params_for_unknown_node() {
        let pipeline = Pipeline::builder().build().unwrap();
        let params = RuntimeParams::new().for_node("Nope", Default::default());

        let err = Evaluator::new()
            .evaluate_pipeline(&pipeline, &PipelineExecutorImpl::new(), &labels(), &params)
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_pipeline_rejects_zero_top_k_before_any_query() {
        let mut scorer = MockRetrievalScorer::new();
        scorer.expect_score().never();
        scorer.expect_scorer_name().return_const("unused");
        let retriever = Retriever::new(Arc::new(scorer), store().await);

        let pipeline = Pipeline::builder()
            .add_node("Retriever", Arc::new(RetrieverNode::new(retriever)), &["Query"])
            .build()
            .unwrap();
        let params = RuntimeParams::new()
            .for_node("Retriever", NodeParams::new().with("top_k", json!(0)));

        let err = Evaluator::new()
            .evaluate_pipeline(&pipeline, &PipelineExecutorImpl::new(), &labels(), &params)
            .await
            .unwrap_err();

        assert!(err.is_configuration());
        assert!(matches!(err, PipelineError::InvalidParams { ref node, .. } if node == "Retriever"));
    }

    #[tokio::test]
    async fn test_answer_node_judged_by_span_even_when_first_query_is_empty() {
        let mut labels = labels();
        labels.extend(LabelAggregator::new(true, false).aggregate(vec![Label::new("Q2", "D2")
            .with_answer(Answer::new("Berlin", "D2", Span::new(0, 6), 1.0))]));

        let pipeline = Pipeline::builder()
            .add_node("Answers", Arc::new(LateAnswerNode), &["Query"])
            .build()
            .unwrap();

        let result = Evaluator::new()
            .with_concurrency(1)
            .evaluate_pipeline(&pipeline, &PipelineExecutorImpl::new(), &labels, &RuntimeParams::new())
            .await
            .unwrap();

        let table = result.node("Answers").unwrap();
        assert_eq!(table.kind, NodeKind::Reading);
        assert_eq!(table.queries.len(), 2);
        assert!(table.rows.iter().all(|row| row.answer.is_some()));

        let metrics = result.calculate_metrics();
        assert_eq!(metrics["Answers"].as_reading().unwrap().exact_match, Some(0.5));
    }
}
