//! Grouping of raw labels into multi-labels

use std::collections::HashMap;

use tracing::debug;

use super::entity::{Label, LabelOrigin, MultiLabel};

/// Groups raw labels by query, applying drop rules
#[derive(Debug, Clone, Default)]
pub struct LabelAggregator {
    drop_negative: bool,
    drop_no_answer: bool,
    origin: Option<LabelOrigin>,
}

impl LabelAggregator {
    pub fn new(drop_negative: bool, drop_no_answer: bool) -> Self {
        Self {
            drop_negative,
            drop_no_answer,
            origin: None,
        }
    }

    /// Keep only labels of the given origin
    pub fn with_origin(mut self, origin: LabelOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    fn keeps(&self, label: &Label) -> bool {
        if self.drop_negative && label.is_negative() {
            return false;
        }
        if self.drop_no_answer && label.is_no_answer() {
            return false;
        }
        self.origin.is_none_or(|origin| label.origin == origin)
    }

    /// Aggregate labels, preserving first-appearance order of queries.
    /// Queries left without labels after dropping are omitted.
    pub fn aggregate(&self, labels: impl IntoIterator<Item = Label>) -> Vec<MultiLabel> {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Label>> = HashMap::new();
        let mut dropped = 0usize;

        for label in labels {
            if !self.keeps(&label) {
                dropped += 1;
                continue;
            }

            if !groups.contains_key(&label.query) {
                order.push(label.query.clone());
            }
            groups.entry(label.query.clone()).or_default().push(label);
        }

        debug!(queries = order.len(), dropped, "Aggregated labels");

        order
            .into_iter()
            .filter_map(|query| {
                let labels = groups.remove(&query)?;
                // every label in the group carries this exact query
                MultiLabel::new(query, labels).ok()
            })
            .collect()
    }
}
