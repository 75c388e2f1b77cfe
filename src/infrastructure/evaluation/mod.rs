//! Evaluation services

mod evaluator;

pub use evaluator::{Evaluator, READER_NODE, RETRIEVER_NODE};
