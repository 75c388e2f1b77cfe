//! Aggregate metrics derived from per-node evaluation tables
//!
//! A metric that has no eligible query is `None`, never zero. Queries that
//! lack the ground truth a metric needs are counted in `excluded_queries`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::normalize::best_f1;
use super::result::{EvaluationRow, NodeEvaluation, QueryGold};

/// Document-level metrics of a retrieval node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMetrics {
    pub recall_single_hit: Option<f64>,
    pub recall_multi_hit: Option<f64>,
    pub mrr: Option<f64>,
    pub precision: Option<f64>,
    pub map: Option<f64>,
    pub top_k: usize,
    pub evaluated_queries: usize,
    pub excluded_queries: usize,
}

/// Answer-level metrics of a reading node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderMetrics {
    pub top_n_accuracy: Option<f64>,
    pub exact_match: Option<f64>,
    pub f1: Option<f64>,
    /// Only present when a comparator scored the answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sas: Option<f64>,
    pub n: usize,
    pub evaluated_queries: usize,
    pub excluded_queries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeMetrics {
    Retrieval(RetrievalMetrics),
    Reading(ReaderMetrics),
}

impl NodeMetrics {
    pub fn as_retrieval(&self) -> Option<&RetrievalMetrics> {
        match self {
            Self::Retrieval(metrics) => Some(metrics),
            Self::Reading(_) => None,
        }
    }

    pub fn as_reading(&self) -> Option<&ReaderMetrics> {
        match self {
            Self::Reading(metrics) => Some(metrics),
            Self::Retrieval(_) => None,
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn rows_within<'a>(table: &'a NodeEvaluation, gold: &'a QueryGold, depth: usize) -> Vec<&'a EvaluationRow> {
    table
        .rows_for(&gold.query)
        .filter(|row| row.rank <= depth)
        .collect()
}

/// Retrieval metrics over rows ranked `<= depth`
pub(crate) fn compute_retrieval_metrics(table: &NodeEvaluation, depth: usize) -> RetrievalMetrics {
    let mut single_hit = Vec::new();
    let mut multi_hit = Vec::new();
    let mut reciprocal_ranks = Vec::new();
    let mut precisions = Vec::new();
    let mut average_precisions = Vec::new();
    let mut excluded = 0;

    for gold in &table.queries {
        let gold_ids: HashSet<&str> = gold.gold_document_ids.iter().map(String::as_str).collect();
        if gold_ids.is_empty() {
            excluded += 1;
            continue;
        }

        // Ranks at which a not-yet-seen gold document first appears
        let mut found: HashSet<&str> = HashSet::new();
        let mut hit_ranks = Vec::new();
        for row in rows_within(table, gold, depth) {
            let Some(id) = row.document_id.as_deref() else {
                continue;
            };
            if gold_ids.contains(id) && found.insert(id) {
                hit_ranks.push(row.rank);
            }
        }

        let hits = hit_ranks.len();
        single_hit.push(if hits > 0 { 1.0 } else { 0.0 });
        multi_hit.push(hits as f64 / gold_ids.len() as f64);
        reciprocal_ranks.push(hit_ranks.first().map_or(0.0, |rank| 1.0 / *rank as f64));
        precisions.push(hits as f64 / depth as f64);

        let ap = if hits == 0 {
            0.0
        } else {
            hit_ranks
                .iter()
                .enumerate()
                .map(|(i, rank)| (i + 1) as f64 / *rank as f64)
                .sum::<f64>()
                / hits as f64
        };
        average_precisions.push(ap);
    }

    RetrievalMetrics {
        recall_single_hit: mean(&single_hit),
        recall_multi_hit: mean(&multi_hit),
        mrr: mean(&reciprocal_ranks),
        precision: mean(&precisions),
        map: mean(&average_precisions),
        top_k: depth,
        evaluated_queries: single_hit.len(),
        excluded_queries: excluded,
    }
}

/// Reader metrics; `n` bounds the top-n accuracy
pub(crate) fn compute_reader_metrics(table: &NodeEvaluation, n: usize) -> ReaderMetrics {
    let mut top_n = Vec::new();
    let mut exact = Vec::new();
    let mut f1 = Vec::new();
    let mut sas = Vec::new();
    let mut excluded = 0;

    for gold in &table.queries {
        if gold.gold_answers.is_empty() {
            excluded += 1;
            continue;
        }

        let rows = rows_within(table, gold, n);
        top_n.push(if rows.iter().any(|row| row.gold_match) { 1.0 } else { 0.0 });

        match rows.first().filter(|row| row.rank == 1) {
            Some(top) => {
                exact.push(if top.gold_match { 1.0 } else { 0.0 });
                f1.push(best_f1(top.answer.as_deref().unwrap_or(""), &gold.gold_answers));
                if let Some(similarity) = top.sas {
                    sas.push(similarity);
                }
            }
            None => {
                exact.push(0.0);
                f1.push(0.0);
            }
        }
    }

    ReaderMetrics {
        top_n_accuracy: mean(&top_n),
        exact_match: mean(&exact),
        f1: mean(&f1),
        sas: mean(&sas),
        n,
        evaluated_queries: top_n.len(),
        excluded_queries: excluded,
    }
}
