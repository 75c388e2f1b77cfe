use serde::Deserialize;

use crate::domain::DomainError;
use crate::infrastructure::pseudo_label::PseudoLabelConfig;
use crate::infrastructure::reading::ReaderConfig;
use crate::infrastructure::retrieval::Bm25Config;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub retriever: RetrieverConfig,
    pub reader: ReaderConfig,
    pub evaluation: EvaluationConfig,
    pub pseudo_label: PseudoLabelConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    pub top_k: usize,
    pub bm25: Bm25Config,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Queries evaluated concurrently
    pub concurrency: usize,
    /// Drop labels with neither a correct document nor a correct answer
    pub drop_negative: bool,
    /// Drop labels without an answer
    pub drop_no_answer: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            bm25: Bm25Config::default(),
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            drop_negative: true,
            drop_no_answer: false,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("QA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject values no component can be built with
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.retriever.top_k == 0 {
            return Err(DomainError::configuration("retriever.top_k must be positive"));
        }
        if self.reader.top_k == 0 {
            return Err(DomainError::configuration("reader.top_k must be positive"));
        }
        if self.evaluation.concurrency == 0 {
            return Err(DomainError::configuration("evaluation.concurrency must be positive"));
        }
        if self.retriever.bm25.k1 < 0.0 || !(0.0..=1.0).contains(&self.retriever.bm25.b) {
            return Err(DomainError::configuration(
                "retriever.bm25 requires k1 >= 0 and 0 <= b <= 1",
            ));
        }
        self.pseudo_label.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retriever.top_k, 10);
        assert_eq!(config.reader.top_k, 3);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.pseudo_label.mining_top_k(), 2);
    }

    #[test]
    fn test_partial_sections_deserialize_with_defaults() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "logging": { "format": "json" },
            "reader": { "return_no_answer": true },
            "pseudo_label": { "negatives_per_query": 3 }
        }))
        .unwrap();

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.reader.return_no_answer);
        assert_eq!(config.reader.top_k, 3);
        assert_eq!(config.pseudo_label.mining_top_k(), 4);
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = AppConfig::default();
        config.retriever.top_k = 0;
        assert!(config.validate().unwrap_err().is_configuration());

        let mut config = AppConfig::default();
        config.pseudo_label.batch_size = 0;
        assert!(config.validate().unwrap_err().is_configuration());
    }
}
