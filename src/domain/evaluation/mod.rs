//! Evaluation domain module
//!
//! Pipeline outputs are compared against aggregated labels and recorded as
//! one ranked table per node. Metrics are always recomputed from those
//! tables.

mod metrics;
mod normalize;
mod result;

pub use metrics::{NodeMetrics, ReaderMetrics, RetrievalMetrics};
pub use normalize::{best_f1, exact_match, f1_score, matches_any, normalize_answer};
pub use result::{EvaluationResult, EvaluationRow, NodeEvaluation, NodeKind, QueryFailure, QueryGold};
