//! Claim-to-source grounding validation
//!
//! Checks a generated answer against the sources it was composed from:
//! every `[n]` citation must point at a real source, every cited claim must
//! actually be supported by a cited excerpt, and numeric factual sentences
//! without any citation are flagged. A failed check is a structured result,
//! never an error — the caller decides what a low-confidence answer means.

pub mod lexer;

use crate::resolver::similarity::edit_ratio;
use lexer::{SentenceKind, SentenceToken};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

static STOPWORDS: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "from", "as", "is", "was", "are", "were", "be", "this", "that", "it", "its",
    ]
    .into_iter()
    .collect()
});

/// An immutable evidence source supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub file: String,
    pub excerpt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Validation outcome for one answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub invalid_citations: Vec<i64>,
    pub unsupported_claims: Vec<String>,
    pub missing_citations: Vec<String>,
    pub confidence_score: f64,
    pub total_citations: usize,
    pub valid_citations: usize,
    pub citation_accuracy: f64,
    pub claim_support: f64,
}

/// One claim with the sources it cites, for "why was this said" UIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub claim_id: usize,
    pub claim_text: String,
    pub citation_ids: Vec<i64>,
    pub sources: Vec<Source>,
}

/// Validator configuration.
///
/// The 0.7/0.3 confidence split and the 0.3 support threshold are inherited
/// magic numbers; they are parameters so a labeled dataset can recalibrate
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    #[serde(default = "default_citation_weight")]
    pub citation_weight: f64,
    #[serde(default = "default_support_weight")]
    pub support_weight: f64,
    #[serde(default = "default_support_threshold")]
    pub support_threshold: f64,
    /// Claims shorter than this (after citation stripping) are ignored.
    #[serde(default = "default_min_claim_chars")]
    pub min_claim_chars: usize,
    /// Sentences shorter than this are never missing-citation violations.
    #[serde(default = "default_min_factual_chars")]
    pub min_factual_chars: usize,
    /// Maximum proportional discount applied for missing citations.
    #[serde(default = "default_missing_discount")]
    pub missing_discount: f64,
}

fn default_citation_weight() -> f64 {
    0.7
}
fn default_support_weight() -> f64 {
    0.3
}
fn default_support_threshold() -> f64 {
    0.3
}
fn default_min_claim_chars() -> usize {
    10
}
fn default_min_factual_chars() -> usize {
    25
}
fn default_missing_discount() -> f64 {
    0.5
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            citation_weight: default_citation_weight(),
            support_weight: default_support_weight(),
            support_threshold: default_support_threshold(),
            min_claim_chars: default_min_claim_chars(),
            min_factual_chars: default_min_factual_chars(),
            missing_discount: default_missing_discount(),
        }
    }
}

/// Pure, stateless grounding validator.
pub struct CitationValidator {
    config: ValidatorConfig,
}

impl CitationValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validate an answer against the sources it claims to cite.
    pub fn validate(&self, answer: &str, sources: &[Source]) -> ValidationResult {
        let source_index: BTreeMap<i64, &Source> = sources.iter().map(|s| (s.id, s)).collect();
        let tokens = lexer::segment(answer);

        let all_citations: Vec<i64> = tokens.iter().flat_map(|t| t.citations.clone()).collect();
        let invalid_citations: Vec<i64> = all_citations
            .iter()
            .copied()
            .filter(|id| !source_index.contains_key(id))
            .collect();

        let claims = self.claims(&tokens);
        let unsupported_claims: Vec<String> = claims
            .iter()
            .filter(|(text, citation_ids)| {
                !citation_ids.iter().any(|id| {
                    source_index
                        .get(id)
                        .map(|source| self.claim_supported(text, &source.excerpt))
                        .unwrap_or(false)
                })
            })
            .map(|(text, _)| truncate_chars(text, 100))
            .collect();

        let missing_citations: Vec<String> = tokens
            .iter()
            .filter(|t| self.is_uncited_factual(t))
            .map(|t| truncate_chars(&t.text, 120))
            .collect();

        let total_citations = all_citations.len();
        let valid_citations = total_citations - invalid_citations.len();
        let citation_accuracy = if total_citations > 0 {
            valid_citations as f64 / total_citations as f64
        } else {
            1.0
        };

        let total_claims = claims.len();
        let claim_support = if total_claims > 0 {
            (total_claims - unsupported_claims.len()) as f64 / total_claims as f64
        } else {
            1.0
        };

        let mut confidence_score = citation_accuracy * self.config.citation_weight
            + claim_support * self.config.support_weight;

        if !missing_citations.is_empty() {
            let sentence_count = tokens.len().max(1);
            let missing_rate = (missing_citations.len() as f64 / sentence_count as f64).min(1.0);
            confidence_score *= 1.0 - self.config.missing_discount * missing_rate;
        }

        ValidationResult {
            is_valid: invalid_citations.is_empty()
                && unsupported_claims.is_empty()
                && missing_citations.is_empty(),
            invalid_citations,
            unsupported_claims,
            missing_citations,
            confidence_score,
            total_citations,
            valid_citations,
            citation_accuracy,
            claim_support,
        }
    }

    /// Claims and their cited sources, for evidence-expansion UIs.
    pub fn build_evidence(&self, answer: &str, sources: &[Source]) -> Vec<Evidence> {
        let source_index: BTreeMap<i64, &Source> = sources.iter().map(|s| (s.id, s)).collect();
        let tokens = lexer::segment(answer);

        self.claims(&tokens)
            .into_iter()
            .enumerate()
            .map(|(i, (claim_text, citation_ids))| {
                let sources = citation_ids
                    .iter()
                    .filter_map(|id| source_index.get(id).map(|s| (*s).clone()))
                    .collect();
                Evidence {
                    claim_id: i + 1,
                    claim_text,
                    citation_ids,
                    sources,
                }
            })
            .collect()
    }

    /// Human-readable rendering of a validation result.
    pub fn summary(&self, result: &ValidationResult) -> String {
        if result.is_valid {
            return format!(
                "All citations valid (confidence: {:.1}%)",
                result.confidence_score * 100.0
            );
        }

        let mut lines = Vec::new();
        if !result.invalid_citations.is_empty() {
            lines.push(format!(
                "Nonexistent citations: {:?}",
                result.invalid_citations
            ));
        }
        if !result.unsupported_claims.is_empty() {
            lines.push(format!(
                "Claims unsupported by cited sources: {}",
                result.unsupported_claims.len()
            ));
        }
        if !result.missing_citations.is_empty() {
            lines.push(format!(
                "Factual sentences without citations: {}",
                result.missing_citations.len()
            ));
        }
        lines.push(format!(
            "Confidence: {:.1}% (citation accuracy {:.1}%, claim support {:.1}%)",
            result.confidence_score * 100.0,
            result.citation_accuracy * 100.0,
            result.claim_support * 100.0
        ));
        lines.join("\n")
    }

    /// Sentences carrying at least one citation, as (bare claim, ids) pairs.
    fn claims(&self, tokens: &[SentenceToken]) -> Vec<(String, Vec<i64>)> {
        tokens
            .iter()
            .filter(|t| !t.citations.is_empty())
            .filter_map(|t| {
                let bare = lexer::strip_citations(&t.text);
                if bare.chars().count() > self.config.min_claim_chars {
                    Some((bare, t.citations.clone()))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Whether a claim is supported by a source excerpt: direct containment
    /// either direction, then stopword-filtered token overlap, then a string
    /// similarity ratio as a last resort.
    fn claim_supported(&self, claim: &str, excerpt: &str) -> bool {
        if claim.is_empty() || excerpt.is_empty() {
            return false;
        }

        let claim_lower = claim.to_lowercase();
        let excerpt_lower = excerpt.to_lowercase();

        if excerpt_lower.contains(&claim_lower) || claim_lower.contains(&excerpt_lower) {
            return true;
        }

        let claim_words = content_words(&claim_lower);
        let excerpt_words = content_words(&excerpt_lower);
        if !claim_words.is_empty() {
            let overlap = claim_words.intersection(&excerpt_words).count() as f64
                / claim_words.len() as f64;
            if overlap >= self.config.support_threshold {
                return true;
            }
        }

        edit_ratio(&claim_lower, &excerpt_lower) >= self.config.support_threshold
    }

    /// Prose of reasonable length carrying a numeric signal but no citation.
    fn is_uncited_factual(&self, token: &SentenceToken) -> bool {
        token.kind == SentenceKind::Prose
            && token.citations.is_empty()
            && token.has_numeric_signal
            && token.text.chars().count() >= self.config.min_factual_chars
    }
}

impl Default for CitationValidator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}

/// Alphanumeric word tokens minus stopwords.
fn content_words(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(w))
        .map(String::from)
        .collect()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: i64, excerpt: &str) -> Source {
        Source {
            id,
            file: format!("doc_{id}.pdf"),
            excerpt: excerpt.to_string(),
            url: None,
        }
    }

    fn validator() -> CitationValidator {
        CitationValidator::default()
    }

    #[test]
    fn test_clean_answer_is_valid() {
        let sources = vec![source(1, "Revenue grew 20% year over year")];
        let result = validator().validate("Revenue grew 20% [1].", &sources);

        assert!(result.is_valid);
        assert!(result.invalid_citations.is_empty());
        assert!(result.unsupported_claims.is_empty());
        assert!(result.missing_citations.is_empty());
        assert!(result.confidence_score >= 0.7);
    }

    #[test]
    fn test_fabricated_citation_detected() {
        let sources = vec![source(1, "Revenue grew 20% year over year")];
        let result = validator().validate("Revenue grew 20% [2].", &sources);

        assert!(!result.is_valid);
        assert_eq!(result.invalid_citations, vec![2]);
    }

    #[test]
    fn test_missing_citation_detected() {
        let sources = vec![source(1, "anything")];
        let result = validator().validate("Revenue grew 45% this quarter.", &sources);

        assert!(!result.is_valid);
        assert_eq!(result.missing_citations.len(), 1);
        assert!(result.missing_citations[0].contains("Revenue grew 45%"));
    }

    #[test]
    fn test_unsupported_claim_detected() {
        let sources = vec![source(1, "The weather in Taipei was mild in March")];
        let result = validator().validate("Company X acquired Company Z [1].", &sources);

        assert!(!result.is_valid);
        assert_eq!(result.unsupported_claims.len(), 1);
    }

    #[test]
    fn test_zero_citation_ignored_as_invalid() {
        let sources = vec![source(1, "Revenue grew 20% year over year")];
        let result = validator().validate("Revenue grew 20% [0].", &sources);
        assert!(result.invalid_citations.contains(&0));
    }

    #[test]
    fn test_token_overlap_support() {
        // Not verbatim containment, but strong word overlap with the source.
        let sources = vec![source(
            1,
            "TSMC fabricates the majority of Nvidia's data center GPUs at its Taiwan fabs",
        )];
        let result =
            validator().validate("Nvidia depends on TSMC fabs for data center GPUs [1].", &sources);

        assert!(result.unsupported_claims.is_empty());
        assert!(result.is_valid);
    }

    #[test]
    fn test_no_citations_at_all_scores_full_accuracy() {
        let result = validator().validate("The outlook remains broadly stable.", &[]);
        assert_eq!(result.total_citations, 0);
        assert_eq!(result.citation_accuracy, 1.0);
        assert!(result.is_valid);
    }

    #[test]
    fn test_headings_not_flagged() {
        let sources = vec![source(1, "Revenue grew 20% year over year")];
        let answer = "# Q3 2024 Results\nRevenue grew 20% [1].";
        let result = validator().validate(answer, &sources);
        assert!(result.missing_citations.is_empty());
    }

    #[test]
    fn test_missing_discount_applied() {
        let sources = vec![source(1, "Revenue grew 20% year over year")];
        // One supported claim, one uncited numeric sentence.
        let answer = "Revenue grew 20% [1]. Gross margin reached 75% in the same quarter.";
        let result = validator().validate(answer, &sources);

        assert!(!result.is_valid);
        assert_eq!(result.missing_citations.len(), 1);
        // 1.0 weighted confidence discounted by 0.5 * (1/2).
        assert!((result.confidence_score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_build_evidence_attaches_sources() {
        let sources = vec![
            source(1, "Revenue grew 20% year over year"),
            source(2, "Gross margin expanded to 75%"),
        ];
        let answer = "Revenue grew 20% [1]. Margins expanded to 75% [2].";
        let evidence = validator().build_evidence(answer, &sources);

        assert_eq!(evidence.len(), 2);
        assert_eq!(evidence[0].claim_id, 1);
        assert_eq!(evidence[0].citation_ids, vec![1]);
        assert_eq!(evidence[0].sources[0].id, 1);
        assert_eq!(evidence[1].sources[0].id, 2);
    }

    #[test]
    fn test_evidence_skips_unknown_source_ids() {
        let sources = vec![source(1, "Revenue grew 20%")];
        let evidence = validator().build_evidence("Revenue grew 20% [1][9].", &sources);

        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].citation_ids, vec![1, 9]);
        assert_eq!(evidence[0].sources.len(), 1);
    }

    #[test]
    fn test_summary_renders_violations() {
        let sources = vec![source(1, "unrelated excerpt about logistics costs")];
        let result = validator().validate("Company X acquired Company Z [1].", &sources);
        let summary = validator().summary(&result);

        assert!(summary.contains("unsupported"));
        assert!(summary.contains("Confidence"));
    }
}
