//! Answer normalisation and string-match scores
//!
//! One normalisation is applied to every answer comparison:
//! lowercase, drop punctuation, drop the articles `a`, `an` and `the`,
//! collapse whitespace.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static ARTICLES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(a|an|the)\b").unwrap());

/// Normalise an answer string for comparison
pub fn normalize_answer(text: &str) -> String {
    let lowered = text.to_lowercase();
    let without_punctuation: String = lowered
        .chars()
        .filter(|c| !c.is_ascii_punctuation() && !is_unicode_punctuation(*c))
        .collect();
    let without_articles = ARTICLES.replace_all(&without_punctuation, " ");

    without_articles.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_unicode_punctuation(c: char) -> bool {
    matches!(
        c,
        '\u{2010}'..='\u{2027}' | '\u{2030}'..='\u{205E}' | '\u{00A1}' | '\u{00BF}' | '\u{00AB}' | '\u{00BB}'
    )
}

/// Normalised strings are identical
pub fn exact_match(prediction: &str, gold: &str) -> bool {
    normalize_answer(prediction) == normalize_answer(gold)
}

/// Prediction exactly matches at least one gold answer
pub fn matches_any(prediction: &str, golds: &[String]) -> bool {
    golds.iter().any(|gold| exact_match(prediction, gold))
}

/// Token-overlap F1 between normalised prediction and gold.
/// Both empty scores 1.0; exactly one empty scores 0.0.
pub fn f1_score(prediction: &str, gold: &str) -> f64 {
    let prediction = normalize_answer(prediction);
    let gold = normalize_answer(gold);
    let pred_tokens: Vec<&str> = prediction.split_whitespace().collect();
    let gold_tokens: Vec<&str> = gold.split_whitespace().collect();

    if pred_tokens.is_empty() && gold_tokens.is_empty() {
        return 1.0;
    }
    if pred_tokens.is_empty() || gold_tokens.is_empty() {
        return 0.0;
    }

    let mut gold_counts: HashMap<&str, usize> = HashMap::new();
    for token in &gold_tokens {
        *gold_counts.entry(token).or_insert(0) += 1;
    }

    let mut common = 0usize;
    for token in &pred_tokens {
        if let Some(count) = gold_counts.get_mut(token) {
            if *count > 0 {
                *count -= 1;
                common += 1;
            }
        }
    }

    if common == 0 {
        return 0.0;
    }

    let precision = common as f64 / pred_tokens.len() as f64;
    let recall = common as f64 / gold_tokens.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

/// Highest F1 of the prediction against any gold answer
pub fn best_f1(prediction: &str, golds: &[String]) -> f64 {
    golds
        .iter()
        .map(|gold| f1_score(prediction, gold))
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_answer() {
        assert_eq!(normalize_answer("The Eiffel  Tower!"), "eiffel tower");
        assert_eq!(normalize_answer("  an Apple, a day "), "apple day");
        assert_eq!(normalize_answer("«Bonjour»"), "bonjour");
        assert_eq!(normalize_answer("theory"), "theory");
    }

    #[test]
    fn test_exact_match_ignores_case_punctuation_articles() {
        assert!(exact_match("the Paris.", "paris"));
        assert!(!exact_match("Paris France", "paris"));
    }

    #[test]
    fn test_f1_partial_overlap() {
        let f1 = f1_score("Eiffel Tower Paris", "the Eiffel Tower");
        // precision 2/3, recall 2/2
        assert!((f1 - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_f1_edge_cases() {
        assert_eq!(f1_score("", ""), 1.0);
        assert_eq!(f1_score("", "paris"), 0.0);
        assert_eq!(f1_score("london", "paris"), 0.0);
        assert_eq!(f1_score("Paris", "paris"), 1.0);
    }

    #[test]
    fn test_best_f1_and_matches_any() {
        let golds = vec!["Berlin".to_string(), "the city of Paris".to_string()];
        assert!((best_f1("Paris", &golds) - 0.5).abs() < 1e-9);
        assert!(matches_any("berlin", &golds));
        assert!(!matches_any("Paris", &golds));
        assert_eq!(best_f1("Paris", &[]), 0.0);
    }
}
