//! Ground-truth labels and their aggregation per query

mod aggregator;
mod entity;

pub use aggregator::LabelAggregator;
pub use entity::{Label, LabelOrigin, MultiLabel};
