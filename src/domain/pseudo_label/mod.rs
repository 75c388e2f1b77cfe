//! Pseudo-label domain module
//!
//! Training triples for adapting a retriever to a new corpus: generated
//! queries, negatives mined with the retriever, and a comparator margin.

mod entity;
mod questions;

pub use entity::{GenerationReport, PseudoLabel, SkipReason, SkipRecord};
pub use questions::{PreSuppliedQuestions, QuestionGenerator};

#[cfg(test)]
pub use questions::MockQuestionGenerator;
