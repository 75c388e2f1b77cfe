//! Per-node parameter bags

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::DomainError;

/// Free-form parameters for a single node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeParams(Map<String, Value>);

impl NodeParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn get_raw(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deserialize a parameter, failing with a configuration error on a type mismatch
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DomainError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                DomainError::configuration(format!("invalid value for parameter '{}': {}", key, e))
            }),
        }
    }

    /// Read a `top_k` style parameter, which must be a positive integer
    pub fn get_top_k(&self, key: &str) -> Result<Option<usize>, DomainError> {
        match self.get::<usize>(key)? {
            Some(0) => Err(DomainError::configuration(format!(
                "parameter '{}' must be a positive integer",
                key
            ))),
            other => Ok(other),
        }
    }

    /// Defaults overlaid with `overrides`; neither input is modified
    pub fn merged(&self, overrides: Option<&NodeParams>) -> NodeParams {
        let mut merged = self.0.clone();

        if let Some(overrides) = overrides {
            for (key, value) in &overrides.0 {
                merged.insert(key.clone(), value.clone());
            }
        }

        NodeParams(merged)
    }
}

impl From<Map<String, Value>> for NodeParams {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Per-call parameter overrides keyed by node name, scoped to one execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuntimeParams(HashMap<String, NodeParams>);

impl RuntimeParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set overrides for a node
    pub fn for_node(mut self, node: impl Into<String>, params: NodeParams) -> Self {
        self.0.insert(node.into(), params);
        self
    }

    pub fn get(&self, node: &str) -> Option<&NodeParams> {
        self.0.get(node)
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}
