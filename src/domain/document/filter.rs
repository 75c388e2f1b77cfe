//! Metadata filtering for retrieval queries

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Comparison operators for metadata filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Substring match on string fields
    Contains,
    In,
    NotIn,
    Exists,
    NotExists,
}

impl FilterOperator {
    fn requires_value(self) -> bool {
        !matches!(self, Self::Exists | Self::NotExists)
    }

    fn is_ordered(self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte)
    }

    fn is_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "!="),
            Self::Gt => write!(f, ">"),
            Self::Gte => write!(f, ">="),
            Self::Lt => write!(f, "<"),
            Self::Lte => write!(f, "<="),
            Self::Contains => write!(f, "contains"),
            Self::In => write!(f, "in"),
            Self::NotIn => write!(f, "not_in"),
            Self::Exists => write!(f, "exists"),
            Self::NotExists => write!(f, "not_exists"),
        }
    }
}

/// Logical connectors for combining filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterConnector {
    #[default]
    And,
    Or,
}

/// Filter value that can be various types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    List(Vec<FilterValue>),
    Null,
}

impl FilterValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(list: Vec<T>) -> Self {
        Self::List(list.into_iter().map(|v| v.into()).collect())
    }
}

/// A single filter condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub key: String,
    pub operator: FilterOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FilterValue>,
}

impl FilterCondition {
    pub fn new(key: impl Into<String>, operator: FilterOperator, value: FilterValue) -> Self {
        Self {
            key: key.into(),
            operator,
            value: Some(value),
        }
    }

    pub fn exists(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            operator: FilterOperator::Exists,
            value: None,
        }
    }

    pub fn not_exists(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            operator: FilterOperator::NotExists,
            value: None,
        }
    }

    pub fn eq(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(key, FilterOperator::Eq, value.into())
    }

    pub fn ne(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(key, FilterOperator::Ne, value.into())
    }

    pub fn gt(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(key, FilterOperator::Gt, value.into())
    }

    pub fn gte(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(key, FilterOperator::Gte, value.into())
    }

    pub fn lt(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(key, FilterOperator::Lt, value.into())
    }

    pub fn lte(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(key, FilterOperator::Lte, value.into())
    }

    pub fn contains(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, FilterOperator::Contains, FilterValue::String(value.into()))
    }

    pub fn in_list(key: impl Into<String>, values: Vec<FilterValue>) -> Self {
        Self::new(key, FilterOperator::In, FilterValue::List(values))
    }

    pub fn not_in_list(key: impl Into<String>, values: Vec<FilterValue>) -> Self {
        Self::new(key, FilterOperator::NotIn, FilterValue::List(values))
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.key.trim().is_empty() {
            return Err(DomainError::configuration("filter condition has an empty key"));
        }

        let value = match (&self.value, self.operator.requires_value()) {
            (None, true) => {
                return Err(DomainError::configuration(format!(
                    "filter '{}' with operator '{}' requires a value",
                    self.key, self.operator
                )));
            }
            (Some(_), false) => {
                return Err(DomainError::configuration(format!(
                    "filter '{}' with operator '{}' takes no value",
                    self.key, self.operator
                )));
            }
            (None, false) => return Ok(()),
            (Some(value), true) => value,
        };

        if self.operator.is_list() && !matches!(value, FilterValue::List(_)) {
            return Err(DomainError::configuration(format!(
                "filter '{}' with operator '{}' requires a list value",
                self.key, self.operator
            )));
        }

        if !self.operator.is_list() && matches!(value, FilterValue::List(_)) {
            return Err(DomainError::configuration(format!(
                "filter '{}' with operator '{}' does not accept a list",
                self.key, self.operator
            )));
        }

        if self.operator.is_ordered() && value.as_f64().is_none() {
            return Err(DomainError::configuration(format!(
                "filter '{}' with operator '{}' requires a numeric value",
                self.key, self.operator
            )));
        }

        if self.operator == FilterOperator::Contains && !matches!(value, FilterValue::String(_)) {
            return Err(DomainError::configuration(format!(
                "filter '{}' with operator 'contains' requires a string value",
                self.key
            )));
        }

        Ok(())
    }

    fn matches(&self, metadata: &HashMap<String, serde_json::Value>) -> bool {
        let doc_value = metadata.get(&self.key);

        match (self.operator, self.value.as_ref()) {
            (FilterOperator::Exists, _) => doc_value.is_some(),
            (FilterOperator::NotExists, _) => doc_value.is_none(),
            (_, None) => false,
            (FilterOperator::Eq, Some(v)) => compare_eq(doc_value, v),
            (FilterOperator::Ne, Some(v)) => !compare_eq(doc_value, v),
            (FilterOperator::Gt, Some(v)) => compare_ord(doc_value, v, |a, b| a > b),
            (FilterOperator::Gte, Some(v)) => compare_ord(doc_value, v, |a, b| a >= b),
            (FilterOperator::Lt, Some(v)) => compare_ord(doc_value, v, |a, b| a < b),
            (FilterOperator::Lte, Some(v)) => compare_ord(doc_value, v, |a, b| a <= b),
            (FilterOperator::Contains, Some(FilterValue::String(needle))) => doc_value
                .and_then(|v| v.as_str())
                .is_some_and(|s| s.contains(needle.as_str())),
            (FilterOperator::Contains, Some(_)) => false,
            (FilterOperator::In, Some(FilterValue::List(values))) => {
                values.iter().any(|val| compare_eq(doc_value, val))
            }
            (FilterOperator::NotIn, Some(FilterValue::List(values))) => {
                !values.iter().any(|val| compare_eq(doc_value, val))
            }
            (FilterOperator::In | FilterOperator::NotIn, Some(_)) => false,
        }
    }
}

/// A metadata filter that can be a single condition or a group of conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataFilter {
    Condition(FilterCondition),
    Group {
        connector: FilterConnector,
        filters: Vec<MetadataFilter>,
    },
}

impl MetadataFilter {
    pub fn condition(condition: FilterCondition) -> Self {
        Self::Condition(condition)
    }

    pub fn and(filters: Vec<MetadataFilter>) -> Self {
        Self::Group {
            connector: FilterConnector::And,
            filters,
        }
    }

    pub fn or(filters: Vec<MetadataFilter>) -> Self {
        Self::Group {
            connector: FilterConnector::Or,
            filters,
        }
    }

    /// Reject malformed predicates before they reach a store
    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            Self::Condition(condition) => condition.validate(),
            Self::Group { filters, .. } => {
                if filters.is_empty() {
                    return Err(DomainError::configuration("filter group has no conditions"));
                }
                filters.iter().try_for_each(MetadataFilter::validate)
            }
        }
    }

    /// Evaluate the filter against a document's metadata
    pub fn matches(&self, metadata: &HashMap<String, serde_json::Value>) -> bool {
        match self {
            Self::Condition(condition) => condition.matches(metadata),
            Self::Group { connector, filters } => match connector {
                FilterConnector::And => filters.iter().all(|f| f.matches(metadata)),
                FilterConnector::Or => filters.iter().any(|f| f.matches(metadata)),
            },
        }
    }
}

/// Builder for creating complex metadata filters
#[derive(Debug, Default)]
pub struct FilterBuilder {
    filters: Vec<MetadataFilter>,
    connector: FilterConnector,
}

impl FilterBuilder {
    /// Create a new filter builder (defaults to AND connector)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder that uses OR connector
    pub fn or() -> Self {
        Self {
            filters: Vec::new(),
            connector: FilterConnector::Or,
        }
    }

    pub fn eq(self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.condition(FilterCondition::eq(key, value))
    }

    pub fn gt(self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.condition(FilterCondition::gt(key, value))
    }

    pub fn lte(self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.condition(FilterCondition::lte(key, value))
    }

    pub fn in_list(self, key: impl Into<String>, values: Vec<FilterValue>) -> Self {
        self.condition(FilterCondition::in_list(key, values))
    }

    pub fn exists(self, key: impl Into<String>) -> Self {
        self.condition(FilterCondition::exists(key))
    }

    /// Add a nested filter group
    pub fn group(mut self, filter: MetadataFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn condition(mut self, condition: FilterCondition) -> Self {
        self.filters.push(MetadataFilter::Condition(condition));
        self
    }

    /// Build the final filter
    pub fn build(mut self) -> Option<MetadataFilter> {
        match self.filters.len() {
            0 => None,
            1 => self.filters.pop(),
            _ => Some(MetadataFilter::Group {
                connector: self.connector,
                filters: self.filters,
            }),
        }
    }
}

fn compare_eq(doc_value: Option<&serde_json::Value>, filter_value: &FilterValue) -> bool {
    match (doc_value, filter_value) {
        (Some(serde_json::Value::String(s)), FilterValue::String(fs)) => s == fs,
        (Some(serde_json::Value::Number(n)), FilterValue::Integer(fi)) => {
            n.as_i64().is_some_and(|i| i == *fi)
        }
        (Some(serde_json::Value::Number(n)), FilterValue::Float(ff)) => {
            n.as_f64().is_some_and(|f| (f - ff).abs() < f64::EPSILON)
        }
        (Some(serde_json::Value::Bool(b)), FilterValue::Boolean(fb)) => b == fb,
        (Some(serde_json::Value::Null), FilterValue::Null) => true,
        _ => false,
    }
}

fn compare_ord<F>(doc_value: Option<&serde_json::Value>, filter_value: &FilterValue, cmp: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (doc_value.and_then(|v| v.as_f64()), filter_value.as_f64()) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}
