//! Okapi BM25 sparse scorer

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::domain::document::{Document, ScoredDocument};
use crate::domain::retrieval::RetrievalScorer;
use crate::domain::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Bm25Config {
    /// Term frequency saturation
    pub k1: f32,
    /// Length normalisation
    pub b: f32,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// Lexical scorer; does not use embeddings
#[derive(Debug, Clone, Default)]
pub struct Bm25Scorer {
    config: Bm25Config,
}

impl Bm25Scorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Bm25Config) -> Self {
        Self { config }
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.unicode_words().map(|w| w.to_lowercase()).collect()
    }

    /// Score every document of `corpus`, in corpus order
    fn score_corpus(&self, query: &str, corpus: &[Document]) -> Vec<f32> {
        let query_terms = Self::tokenize(query);
        let documents: Vec<Vec<String>> = corpus.iter().map(|d| Self::tokenize(&d.content)).collect();

        let total = documents.len() as f32;
        let average_length =
            (documents.iter().map(Vec::len).sum::<usize>() as f32 / total.max(1.0)).max(1.0);

        let mut document_frequency: HashMap<&str, usize> = HashMap::new();
        for terms in &documents {
            let mut seen: Vec<&str> = terms.iter().map(String::as_str).collect();
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        documents
            .iter()
            .map(|terms| {
                let length = terms.len() as f32;
                let mut frequencies: HashMap<&str, usize> = HashMap::new();
                for term in terms {
                    *frequencies.entry(term.as_str()).or_insert(0) += 1;
                }

                query_terms
                    .iter()
                    .map(|term| {
                        let tf = frequencies.get(term.as_str()).copied().unwrap_or(0) as f32;
                        if tf == 0.0 {
                            return 0.0;
                        }
                        let df = document_frequency.get(term.as_str()).copied().unwrap_or(0) as f32;
                        let idf = ((total - df + 0.5) / (df + 0.5) + 1.0).ln();
                        let norm = self.config.k1
                            * (1.0 - self.config.b + self.config.b * length / average_length);
                        idf * tf * (self.config.k1 + 1.0) / (tf + norm)
                    })
                    .sum()
            })
            .collect()
    }
}

#[async_trait]
impl RetrievalScorer for Bm25Scorer {
    async fn score(
        &self,
        query: &str,
        corpus: &[Document],
        _top_k: usize,
    ) -> Result<Vec<ScoredDocument>, DomainError> {
        Ok(self
            .score_corpus(query, corpus)
            .into_iter()
            .zip(corpus)
            .map(|(score, doc)| ScoredDocument::new(doc.clone(), score))
            .collect())
    }

    fn scorer_name(&self) -> &'static str {
        "bm25"
    }
}
