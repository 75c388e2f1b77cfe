//! Evaluation tables and their persistence
//!
//! One table per pipeline node. Metrics are never stored: they are derived
//! from the rows every time, so a reloaded result reproduces them exactly.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::metrics::{compute_reader_metrics, compute_retrieval_metrics, NodeMetrics};
use crate::domain::DomainError;

const MANIFEST_FILE: &str = "manifest.json";
const FAILURES_FILE: &str = "failures.json";
const NODES_DIR: &str = "nodes";

/// How a node's output is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Document-level judgement by id
    Retrieval,
    /// Span-level judgement by normalised answer text
    Reading,
}

/// Ground truth for one query, as seen by one node's table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryGold {
    pub query: String,
    #[serde(default)]
    pub gold_document_ids: Vec<String>,
    #[serde(default)]
    pub gold_answers: Vec<String>,
}

/// One ranked prediction, keyed by `(query, rank)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRow {
    pub query: String,
    /// 1-based, strictly increasing within a query
    pub rank: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub gold_match: bool,
    pub score: f64,
    /// Comparator similarity against the closest gold answer, when measured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sas: Option<f64>,
}

/// All rows produced by one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEvaluation {
    pub node: String,
    pub kind: NodeKind,
    /// Ranking depth the node was evaluated at
    pub top_k: usize,
    pub queries: Vec<QueryGold>,
    pub rows: Vec<EvaluationRow>,
}

impl NodeEvaluation {
    pub fn new(node: impl Into<String>, kind: NodeKind, top_k: usize) -> Self {
        Self {
            node: node.into(),
            kind,
            top_k,
            queries: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Append a query's gold record and its ranked rows
    pub fn push_query(&mut self, gold: QueryGold, rows: Vec<EvaluationRow>) {
        self.queries.push(gold);
        self.rows.extend(rows);
    }

    /// Rows for one query in rank order
    pub fn rows_for<'a>(&'a self, query: &'a str) -> impl Iterator<Item = &'a EvaluationRow> + 'a {
        self.rows.iter().filter(move |row| row.query == query)
    }

    /// Check the row invariants
    pub fn validate(&self) -> Result<(), DomainError> {
        let mut last_rank: BTreeMap<&str, usize> = BTreeMap::new();

        for row in &self.rows {
            if !self.queries.iter().any(|q| q.query == row.query) {
                return Err(DomainError::validation(format!(
                    "node '{}' has a row for unknown query '{}'",
                    self.node, row.query
                )));
            }

            let previous = last_rank.get(row.query.as_str()).copied().unwrap_or(0);
            if row.rank <= previous {
                return Err(DomainError::validation(format!(
                    "node '{}' query '{}': rank {} does not follow rank {}",
                    self.node, row.query, row.rank, previous
                )));
            }
            last_rank.insert(row.query.as_str(), row.rank);
        }

        Ok(())
    }

    /// Metrics at the stored depth, or at a shallower simulated depth.
    /// A simulated depth is clamped to `1..=top_k`.
    pub fn metrics(&self, simulated_top_k: Option<usize>) -> NodeMetrics {
        let stored = self.top_k.max(1);
        let depth = simulated_top_k.map_or(stored, |k| k.clamp(1, stored));

        match self.kind {
            NodeKind::Retrieval => NodeMetrics::Retrieval(compute_retrieval_metrics(self, depth)),
            NodeKind::Reading => NodeMetrics::Reading(compute_reader_metrics(self, depth)),
        }
    }
}

/// A query whose pipeline run failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFailure {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    created_at: DateTime<Utc>,
    /// (node name, file name) in table order
    nodes: Vec<(String, String)>,
}

/// Per-node evaluation tables for one run
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub created_at: DateTime<Utc>,
    nodes: BTreeMap<String, NodeEvaluation>,
    failures: Vec<QueryFailure>,
}

impl Default for EvaluationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluationResult {
    pub fn new() -> Self {
        Self {
            created_at: Utc::now(),
            nodes: BTreeMap::new(),
            failures: Vec::new(),
        }
    }

    /// Table for a node, created on first use
    pub fn node_mut(&mut self, node: &str, kind: NodeKind, top_k: usize) -> &mut NodeEvaluation {
        self.nodes
            .entry(node.to_string())
            .or_insert_with(|| NodeEvaluation::new(node, kind, top_k))
    }

    pub fn insert_node(&mut self, table: NodeEvaluation) {
        self.nodes.insert(table.node.clone(), table);
    }

    pub fn node(&self, node: &str) -> Option<&NodeEvaluation> {
        self.nodes.get(node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeEvaluation> {
        self.nodes.values()
    }

    pub fn record_failure(&mut self, failure: QueryFailure) {
        self.failures.push(failure);
    }

    pub fn failures(&self) -> &[QueryFailure] {
        &self.failures
    }

    /// Metrics for every node, computed from the stored rows
    pub fn calculate_metrics(&self) -> BTreeMap<String, NodeMetrics> {
        self.calculate_metrics_at(None)
    }

    /// Metrics as if each node had returned at most `simulated_top_k` results
    pub fn calculate_metrics_at(&self, simulated_top_k: Option<usize>) -> BTreeMap<String, NodeMetrics> {
        self.nodes
            .iter()
            .map(|(name, table)| (name.clone(), table.metrics(simulated_top_k)))
            .collect()
    }

    /// Write one file per node plus a manifest and the failure list
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<(), DomainError> {
        let dir = dir.as_ref();
        let nodes_dir = dir.join(NODES_DIR);
        fs::create_dir_all(&nodes_dir)?;

        let mut manifest = Manifest {
            created_at: self.created_at,
            nodes: Vec::with_capacity(self.nodes.len()),
        };

        for (index, (name, table)) in self.nodes.iter().enumerate() {
            let file_name = format!("node-{}.json", index);
            fs::write(nodes_dir.join(&file_name), serde_json::to_vec_pretty(table)?)?;
            manifest.nodes.push((name.clone(), file_name));
        }

        fs::write(dir.join(FAILURES_FILE), serde_json::to_vec_pretty(&self.failures)?)?;
        fs::write(dir.join(MANIFEST_FILE), serde_json::to_vec_pretty(&manifest)?)?;

        info!(path = %dir.display(), nodes = self.nodes.len(), "Saved evaluation result");
        Ok(())
    }

    /// Load a result written by [`EvaluationResult::save`]
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let dir = dir.as_ref();
        let manifest: Manifest = serde_json::from_slice(&fs::read(dir.join(MANIFEST_FILE))?)?;

        let mut nodes = BTreeMap::new();
        for (name, file_name) in manifest.nodes {
            let table: NodeEvaluation =
                serde_json::from_slice(&fs::read(dir.join(NODES_DIR).join(&file_name))?)?;

            if table.node != name {
                return Err(DomainError::validation(format!(
                    "file '{}' holds node '{}' but manifest expects '{}'",
                    file_name, table.node, name
                )));
            }
            table.validate()?;
            nodes.insert(name, table);
        }

        let failures_path = dir.join(FAILURES_FILE);
        let failures = if failures_path.exists() {
            serde_json::from_slice(&fs::read(failures_path)?)?
        } else {
            Vec::new()
        };

        debug!(path = %dir.display(), nodes = nodes.len(), "Loaded evaluation result");

        Ok(Self {
            created_at: manifest.created_at,
            nodes,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(query: &str, rank: usize, doc: &str, gold_match: bool, score: f64) -> EvaluationRow {
        EvaluationRow {
            query: query.to_string(),
            rank,
            document_id: Some(doc.to_string()),
            answer: None,
            gold_match,
            score,
            sas: None,
        }
    }

    fn gold(query: &str, docs: &[&str]) -> QueryGold {
        QueryGold {
            query: query.to_string(),
            gold_document_ids: docs.iter().map(|d| d.to_string()).collect(),
            gold_answers: Vec::new(),
        }
    }

    fn sample() -> EvaluationResult {
        let mut result = EvaluationResult::new();
        let table = result.node_mut("Retriever", NodeKind::Retrieval, 3);
        table.push_query(
            gold("q1", &["d1"]),
            vec![
                row("q1", 1, "d2", false, 0.9123456789),
                row("q1", 2, "d1", true, 0.1 + 0.2),
            ],
        );
        table.push_query(gold("q2", &["d3"]), vec![row("q2", 1, "d3", true, 1.0 / 3.0)]);

        let reading = result.node_mut("Reader", NodeKind::Reading, 2);
        reading.push_query(
            QueryGold {
                query: "q1".to_string(),
                gold_document_ids: vec!["d1".to_string()],
                gold_answers: vec!["Paris".to_string()],
            },
            vec![EvaluationRow {
                query: "q1".to_string(),
                rank: 1,
                document_id: Some("d1".to_string()),
                answer: Some("Paris".to_string()),
                gold_match: true,
                score: f64::from(0.73f32),
                sas: Some(f64::from(0.009007432f32)),
            }],
        );
        reading.push_query(
            QueryGold {
                query: "q2".to_string(),
                gold_document_ids: vec!["d3".to_string()],
                gold_answers: vec!["Madrid".to_string()],
            },
            vec![EvaluationRow {
                query: "q2".to_string(),
                rank: 1,
                document_id: Some("d3".to_string()),
                answer: Some("Spain".to_string()),
                gold_match: false,
                score: f64::from(0.41f32),
                sas: Some(f64::from(0.6180339f32)),
            }],
        );
        result.record_failure(QueryFailure {
            query: "q3".to_string(),
            node: Some("Retriever".to_string()),
            message: "boom".to_string(),
        });
        result
    }

    #[test]
    fn test_validate_detects_rank_regression() {
        let mut table = NodeEvaluation::new("R", NodeKind::Retrieval, 2);
        table.push_query(
            gold("q", &["d"]),
            vec![row("q", 2, "a", false, 0.5), row("q", 1, "d", true, 0.4)],
        );
        assert!(table.validate().is_err());

        let mut table = NodeEvaluation::new("R", NodeKind::Retrieval, 2);
        table.push_query(gold("q", &["d"]), vec![row("other", 1, "a", false, 0.5)]);
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_save_and_load_reproduce_metrics() {
        let result = sample();
        let before = result.calculate_metrics();

        let dir = tempfile::tempdir().unwrap();
        result.save(dir.path()).unwrap();
        let loaded = EvaluationResult::load(dir.path()).unwrap();

        assert_eq!(loaded.calculate_metrics(), before);
        assert_eq!(loaded.calculate_metrics_at(Some(1)), result.calculate_metrics_at(Some(1)));
        assert_eq!(loaded, result);
        assert_eq!(loaded.failures().len(), 1);
        assert_eq!(
            loaded.node("Reader").unwrap().rows[0].sas,
            result.node("Reader").unwrap().rows[0].sas
        );
        assert!(before["Reader"].as_reading().unwrap().sas.is_some());
    }

    #[test]
    fn test_load_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = EvaluationResult::load(dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, DomainError::Storage { .. }));
    }
}
