//! Documents, answers and metadata filters

mod entity;
mod filter;

pub use entity::{Answer, Document, ScoredDocument, Span};
pub use filter::{
    FilterBuilder, FilterCondition, FilterConnector, FilterOperator, FilterValue, MetadataFilter,
};
