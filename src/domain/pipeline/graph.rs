//! Pipeline graph: nodes, ordered predecessor edges and construction-time validation

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use super::error::PipelineError;
use super::node::{PipelineNode, QueryNode};
use super::params::{NodeParams, RuntimeParams};

/// Default name of the root node
pub const DEFAULT_ROOT: &str = "Query";

#[derive(Debug, Clone)]
struct NodeEntry {
    component: Arc<dyn PipelineNode>,
    predecessors: Vec<String>,
}

/// Collects nodes and edges; `build` validates the graph
#[derive(Debug)]
pub struct PipelineBuilder {
    root: String,
    nodes: Vec<(String, NodeEntry)>,
}

impl PipelineBuilder {
    /// Start a graph whose root is named `root`
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        let entry = NodeEntry {
            component: Arc::new(QueryNode),
            predecessors: Vec::new(),
        };

        Self {
            nodes: vec![(root.clone(), entry)],
            root,
        }
    }

    /// Add a node fed by `inputs`, in that order
    pub fn add_node(
        mut self,
        name: impl Into<String>,
        component: Arc<dyn PipelineNode>,
        inputs: &[&str],
    ) -> Self {
        self.nodes.push((
            name.into(),
            NodeEntry {
                component,
                predecessors: inputs.iter().map(|s| s.to_string()).collect(),
            },
        ));
        self
    }

    /// Validate and freeze the graph
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        if self.root.trim().is_empty() {
            return Err(PipelineError::invalid_root("root name cannot be empty"));
        }

        let mut declared: Vec<String> = Vec::with_capacity(self.nodes.len());
        let mut nodes: HashMap<String, NodeEntry> = HashMap::with_capacity(self.nodes.len());

        for (name, entry) in self.nodes {
            if nodes.contains_key(&name) {
                if name == self.root {
                    return Err(PipelineError::invalid_root(format!(
                        "'{}' is reserved for the root node",
                        name
                    )));
                }
                return Err(PipelineError::duplicate_node(name));
            }
            declared.push(name.clone());
            nodes.insert(name, entry);
        }

        for name in &declared {
            let entry = &nodes[name];

            if name != &self.root && entry.predecessors.is_empty() {
                return Err(PipelineError::unreachable(name.clone()));
            }

            for predecessor in &entry.predecessors {
                if !nodes.contains_key(predecessor) {
                    return Err(PipelineError::unknown_predecessor(name, predecessor));
                }
            }
        }

        let order = topological_order(&declared, &nodes)?;
        check_reachable(&self.root, &declared, &nodes)?;

        Ok(Pipeline {
            root: self.root,
            nodes,
            order,
        })
    }
}

/// Kahn's algorithm; ready nodes are taken in declaration order so the
/// resulting order is deterministic.
fn topological_order(
    declared: &[String],
    nodes: &HashMap<String, NodeEntry>,
) -> Result<Vec<String>, PipelineError> {
    let mut pending: HashMap<&str, usize> = declared
        .iter()
        .map(|name| (name.as_str(), nodes[name].predecessors.len()))
        .collect();

    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
    for name in declared {
        for predecessor in &nodes[name].predecessors {
            successors
                .entry(predecessor.as_str())
                .or_default()
                .push(name.as_str());
        }
    }

    let mut ready: VecDeque<&str> = declared
        .iter()
        .map(String::as_str)
        .filter(|name| pending[name] == 0)
        .collect();
    let mut order = Vec::with_capacity(declared.len());

    while let Some(name) = ready.pop_front() {
        order.push(name.to_string());

        for successor in successors.get(name).into_iter().flatten() {
            if let Some(count) = pending.get_mut(successor) {
                *count -= 1;
                if *count == 0 {
                    ready.push_back(successor);
                }
            }
        }
    }

    if order.len() < declared.len() {
        let done: HashSet<&str> = order.iter().map(String::as_str).collect();
        let stuck: Vec<String> = declared
            .iter()
            .filter(|name| !done.contains(name.as_str()))
            .cloned()
            .collect();
        return Err(PipelineError::cycle(&stuck));
    }

    Ok(order)
}

fn check_reachable(
    root: &str,
    declared: &[String],
    nodes: &HashMap<String, NodeEntry>,
) -> Result<(), PipelineError> {
    let mut reached: HashSet<&str> = HashSet::from([root]);
    let mut frontier = vec![root];

    while let Some(current) = frontier.pop() {
        for name in declared {
            if !reached.contains(name.as_str())
                && nodes[name].predecessors.iter().any(|p| p == current)
            {
                reached.insert(name.as_str());
                frontier.push(name.as_str());
            }
        }
    }

    match declared.iter().find(|name| !reached.contains(name.as_str())) {
        Some(name) => Err(PipelineError::unreachable(name.clone())),
        None => Ok(()),
    }
}

/// A validated, immutable DAG of components
#[derive(Clone)]
pub struct Pipeline {
    root: String,
    nodes: HashMap<String, NodeEntry>,
    order: Vec<String>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new(DEFAULT_ROOT)
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Node names in execution order
    pub fn topological_order(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn component(&self, name: &str) -> Option<&Arc<dyn PipelineNode>> {
        self.nodes.get(name).map(|entry| &entry.component)
    }

    /// Declared predecessors of a node, in edge order
    pub fn predecessors(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|entry| entry.predecessors.as_slice())
            .unwrap_or(&[])
    }

    /// A node's defaults overlaid with the call's overrides
    pub fn node_params(&self, name: &str, params: &RuntimeParams) -> NodeParams {
        self.component(name)
            .map(|component| component.default_params())
            .unwrap_or_default()
            .merged(params.get(name))
    }

    /// Check call parameters against every node before anything runs
    pub fn validate_params(&self, params: &RuntimeParams) -> Result<(), PipelineError> {
        if let Some(unknown) = params.node_names().find(|name| !self.contains(name)) {
            return Err(PipelineError::unknown_node_params(unknown));
        }

        for name in &self.order {
            if let Some(component) = self.component(name) {
                component
                    .validate_params(&self.node_params(name, params))
                    .map_err(|cause| PipelineError::invalid_params(name.as_str(), cause))?;
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("root", &self.root)
            .field("order", &self.order)
            .finish()
    }
}
