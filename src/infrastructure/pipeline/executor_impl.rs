//! Pipeline executor implementation

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::pipeline::{
    NodeInput, NodeOutput, NodeTrace, Pipeline, PipelineError, PipelineExecutor, PipelineRun,
    PredecessorOutput, RuntimeParams,
};
use crate::domain::DomainError;

/// Runs one query through a pipeline, node by node in topological order.
///
/// Every call owns its outputs; nothing is shared between queries.
#[derive(Debug, Clone, Default)]
pub struct PipelineExecutorImpl {
    /// Checked between nodes, never inside one
    cancellation: Option<CancellationToken>,
}

impl PipelineExecutorImpl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            cancellation: Some(cancellation),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    fn collect_inputs(
        pipeline: &Pipeline,
        name: &str,
        outputs: &HashMap<&str, NodeOutput>,
    ) -> Result<Vec<PredecessorOutput>, DomainError> {
        pipeline
            .predecessors(name)
            .iter()
            .map(|predecessor| {
                outputs
                    .get(predecessor.as_str())
                    .map(|output| PredecessorOutput {
                        node: predecessor.clone(),
                        output: output.clone(),
                    })
                    .ok_or_else(|| {
                        DomainError::not_found(format!(
                            "output of predecessor '{}' is missing",
                            predecessor
                        ))
                    })
            })
            .collect()
    }
}

#[async_trait]
impl PipelineExecutor for PipelineExecutorImpl {
    async fn run(
        &self,
        pipeline: &Pipeline,
        query: &str,
        params: &RuntimeParams,
    ) -> Result<PipelineRun, PipelineError> {
        pipeline.validate_params(params)?;

        let started = Instant::now();
        let mut outputs: HashMap<&str, NodeOutput> = HashMap::with_capacity(pipeline.len());
        let mut traces: Vec<NodeTrace> = Vec::with_capacity(pipeline.len());

        for name in pipeline.topological_order() {
            if self.is_cancelled() {
                warn!(node = %name, query = %query, "Pipeline run cancelled");
                return Err(PipelineError::cancelled(name.as_str(), traces));
            }

            let Some(component) = pipeline.component(name) else {
                let cause = DomainError::not_found(format!("component '{}' is missing", name));
                return Err(PipelineError::node_execution(name.as_str(), cause, traces));
            };

            let inputs = match Self::collect_inputs(pipeline, name, &outputs) {
                Ok(inputs) => inputs,
                Err(cause) => return Err(PipelineError::node_execution(name.as_str(), cause, traces)),
            };
            let input = NodeInput::new(query, inputs);
            let node_params = pipeline.node_params(name, params);

            let node_started = Instant::now();
            debug!(node = %name, component = component.component_type(), "Running node");

            match component.run(&input, &node_params).await {
                Ok(output) => {
                    let elapsed = node_started.elapsed().as_millis() as u64;
                    debug!(node = %name, items = output.items.len(), elapsed_ms = elapsed, "Node finished");
                    traces.push(NodeTrace::new(name.as_str(), output.clone(), elapsed));
                    outputs.insert(name.as_str(), output);
                }
                Err(cause) => {
                    warn!(node = %name, query = %query, error = %cause, "Node failed");
                    return Err(PipelineError::node_execution(name.as_str(), cause, traces));
                }
            }
        }

        Ok(PipelineRun {
            query: query.to_string(),
            traces,
            execution_time_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pipeline::{NodeParams, PipelineNode};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Records its name into a shared log and echoes predecessor names
    #[derive(Debug)]
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        calls: AtomicUsize,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                log: Arc::clone(log),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PipelineNode for Recorder {
        fn component_type(&self) -> &'static str {
            "recorder"
        }

        fn default_params(&self) -> NodeParams {
            NodeParams::new().with("label", json!("default"))
        }

        async fn run(&self, input: &NodeInput, params: &NodeParams) -> Result<NodeOutput, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push(self.name.to_string());

            Ok(NodeOutput::new()
                .with_param("inputs", json!(input.predecessor_names()))
                .with_param("label", params.get_raw("label").cloned().unwrap_or(Value::Null)))
        }
    }

    #[derive(Debug)]
    struct Failing;

    #[async_trait]
    impl PipelineNode for Failing {
        fn component_type(&self) -> &'static str {
            "failing"
        }

        async fn run(&self, _input: &NodeInput, _params: &NodeParams) -> Result<NodeOutput, DomainError> {
            Err(DomainError::timeout("model", 250))
        }
    }

    #[tokio::test]
    async fn test_join_node_receives_inputs_in_edge_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let b = Recorder::new("B", &log);
        let pipeline = Pipeline::builder()
            .add_node("A", Recorder::new("A", &log), &["Query"])
            .add_node("C", Recorder::new("C", &log), &["Query"])
            .add_node("B", b.clone(), &["A", "C"])
            .build()
            .unwrap();

        let run = PipelineExecutorImpl::new()
            .run(&pipeline, "q", &RuntimeParams::new())
            .await
            .unwrap();

        assert_eq!(run.output("B").unwrap().params["inputs"], json!(["A", "C"]));
        assert_eq!(run.executed_nodes(), vec!["Query", "A", "C", "B"]);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_three_levels_run_after_predecessors() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .add_node("L3", Recorder::new("L3", &log), &["L2b", "L2a"])
            .add_node("L2b", Recorder::new("L2b", &log), &["L1"])
            .add_node("L2a", Recorder::new("L2a", &log), &["L1", "Query"])
            .add_node("L1", Recorder::new("L1", &log), &["Query"])
            .build()
            .unwrap();

        PipelineExecutorImpl::new()
            .run(&pipeline, "q", &RuntimeParams::new())
            .await
            .unwrap();

        let order = log.lock().unwrap().clone();
        let pos = |n: &str| order.iter().position(|o| o == n).unwrap();
        assert_eq!(order.len(), 4);
        assert!(pos("L1") < pos("L2a"));
        assert!(pos("L1") < pos("L2b"));
        assert!(pos("L2a") < pos("L3"));
        assert!(pos("L2b") < pos("L3"));
    }

    #[tokio::test]
    async fn test_runtime_params_apply_to_one_call_only() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .add_node("A", Recorder::new("A", &log), &["Query"])
            .build()
            .unwrap();
        let executor = PipelineExecutorImpl::new();

        let overrides =
            RuntimeParams::new().for_node("A", NodeParams::new().with("label", json!("custom")));
        let run = executor.run(&pipeline, "q", &overrides).await.unwrap();
        assert_eq!(run.output("A").unwrap().params["label"], json!("custom"));

        let run = executor.run(&pipeline, "q", &RuntimeParams::new()).await.unwrap();
        assert_eq!(run.output("A").unwrap().params["label"], json!("default"));
    }

    #[tokio::test]
    async fn test_params_for_unknown_node_rejected_before_running() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .add_node("A", Recorder::new("A", &log), &["Query"])
            .build()
            .unwrap();

        let params = RuntimeParams::new().for_node("Missing", NodeParams::new());
        let err = PipelineExecutorImpl::new()
            .run(&pipeline, "q", &params)
            .await
            .unwrap_err();

        assert_eq!(err, PipelineError::unknown_node_params("Missing"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_carries_partial_trace() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let after = Recorder::new("After", &log);
        let pipeline = Pipeline::builder()
            .add_node("A", Recorder::new("A", &log), &["Query"])
            .add_node("Boom", Arc::new(Failing), &["A"])
            .add_node("After", after.clone(), &["Boom"])
            .build()
            .unwrap();

        let err = PipelineExecutorImpl::new()
            .run(&pipeline, "q", &RuntimeParams::new())
            .await
            .unwrap_err();

        assert_eq!(err.node(), Some("Boom"));
        let completed: Vec<&str> = err.trace().iter().map(|t| t.node.as_str()).collect();
        assert_eq!(completed, vec!["Query", "A"]);
        assert!(matches!(
            err,
            PipelineError::NodeExecution { cause: DomainError::Timeout { .. }, .. }
        ));
        assert_eq!(after.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_node() {
        let token = CancellationToken::new();
        token.cancel();
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .add_node("A", Recorder::new("A", &log), &["Query"])
            .build()
            .unwrap();

        let err = PipelineExecutorImpl::with_cancellation(token)
            .run(&pipeline, "q", &RuntimeParams::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Cancelled { .. }));
        assert!(err.trace().is_empty());
    }
}
