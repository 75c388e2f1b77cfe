//! Domain layer - Core entities, capability traits and pure algorithms

pub mod comparator;
pub mod document;
pub mod error;
pub mod evaluation;
pub mod label;
pub mod pipeline;
pub mod pseudo_label;
pub mod reading;
pub mod retrieval;
pub mod store;

pub use comparator::Comparator;
pub use document::{
    Answer, Document, FilterBuilder, FilterCondition, FilterConnector, FilterOperator,
    FilterValue, MetadataFilter, ScoredDocument, Span,
};
pub use error::DomainError;
pub use evaluation::{
    EvaluationResult, EvaluationRow, NodeEvaluation, NodeKind, NodeMetrics, QueryFailure,
    QueryGold, ReaderMetrics, RetrievalMetrics,
};
pub use label::{Label, LabelAggregator, LabelOrigin, MultiLabel};
pub use pipeline::{
    NodeInput, NodeItem, NodeOutput, NodeParams, NodeTrace, Pipeline, PipelineBuilder,
    PipelineError, PipelineExecutor, PipelineNode, PipelineRun, PredecessorOutput, RuntimeParams,
};
pub use pseudo_label::{
    GenerationReport, PreSuppliedQuestions, PseudoLabel, QuestionGenerator, SkipReason,
    SkipRecord,
};
pub use reading::ReadingScorer;
pub use retrieval::{cosine_similarity, DocumentEmbedder, Embedder, RetrievalScorer};
pub use store::{
    DeleteDocumentsResult, DeleteTarget, DocumentStore, DuplicatePolicy, WriteDocumentsResult,
};
