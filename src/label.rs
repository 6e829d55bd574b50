//! Cluster labeling: turning representative questions into a short topic name.
//!
//! The text generator is an injected capability ([`TextGenerator`]). Its
//! reply is folded into a [`LabelOutcome`] by the pure [`resolve_label`], so
//! every fallback rule lives in one place and can be tested without a model:
//!
//! | Input | Generator result | Outcome |
//! |-------|------------------|---------|
//! | no texts | not called | `Labeled("Miscellaneous Questions")` |
//! | texts | `Ok(reply)`, non-empty after cleaning | `Labeled(cleaned)` |
//! | texts | `Ok(reply)`, empty after cleaning | `Fallback(..)` |
//! | texts | `Err(_)` (including timeout) | `Fallback(..)` |
//!
//! The fallback is `"Questions about " + <first 50 chars of the first text> + "..."`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::store::bounded;

/// Label used for a cluster with no usable query text.
pub const MISC_LABEL: &str = "Miscellaneous Questions";

/// Characters of the first query kept in a fallback label.
pub const FALLBACK_PREFIX_CHARS: usize = 50;

/// Queries included in the labeling prompt.
pub const PROMPT_SAMPLES: usize = 5;

/// A text-generation capability (an LLM behind some API).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete `prompt` and return the generated text.
    async fn generate_text(&self, prompt: &str) -> Result<String>;
}

/// Generator used when no model is configured. Every call fails, so labels
/// take the deterministic fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableGenerator;

#[async_trait]
impl TextGenerator for UnavailableGenerator {
    async fn generate_text(&self, _prompt: &str) -> Result<String> {
        Err(Error::Generation("no text generator configured".into()))
    }
}

/// How a cluster's label was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelOutcome {
    /// From the generator, or the fixed label for text-less clusters.
    Labeled(String),
    /// Derived from the first query after the generator failed.
    Fallback(String),
}

impl LabelOutcome {
    /// The label text.
    pub fn text(&self) -> &str {
        match self {
            LabelOutcome::Labeled(text) | LabelOutcome::Fallback(text) => text,
        }
    }

    /// Consume into the label text.
    pub fn into_text(self) -> String {
        match self {
            LabelOutcome::Labeled(text) | LabelOutcome::Fallback(text) => text,
        }
    }

    /// Whether the generator's answer was not used.
    pub fn is_fallback(&self) -> bool {
        matches!(self, LabelOutcome::Fallback(_))
    }
}

/// Prompt asking for a 2-4 word category label.
pub fn build_prompt(queries: &[String]) -> String {
    let samples = queries
        .iter()
        .take(PROMPT_SAMPLES)
        .map(|q| format!("- {q}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Given these user questions:\n{samples}\n\n\
         Generate a short category label (2-4 words) that describes the common theme or topic. \
         Be specific and use technical terms when appropriate. \
         Only return the category label, nothing else."
    )
}

/// Strip surrounding whitespace, then double quotes, then single quotes.
pub fn clean_label(raw: &str) -> &str {
    raw.trim().trim_matches('"').trim_matches('\'').trim()
}

/// Deterministic label derived from the first query.
pub fn fallback_label(first_query: &str) -> String {
    let prefix: String = first_query.chars().take(FALLBACK_PREFIX_CHARS).collect();
    format!("Questions about {prefix}...")
}

/// Fold the generator's result for `queries` into a label.
///
/// `generated` is `None` when the generator was not consulted, which only
/// happens for an empty `queries`.
pub fn resolve_label(queries: &[String], generated: Option<Result<String>>) -> LabelOutcome {
    let Some(first) = queries.first() else {
        return LabelOutcome::Labeled(MISC_LABEL.to_string());
    };

    match generated {
        Some(Ok(reply)) => match clean_label(&reply) {
            "" => LabelOutcome::Fallback(fallback_label(first)),
            label => LabelOutcome::Labeled(label.to_string()),
        },
        Some(Err(_)) | None => LabelOutcome::Fallback(fallback_label(first)),
    }
}

/// Labels clusters through a [`TextGenerator`] with a per-call time budget.
#[derive(Clone)]
pub struct ClusterLabeler {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl std::fmt::Debug for ClusterLabeler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterLabeler")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ClusterLabeler {
    /// Labeler calling `generator`, giving up after `timeout`.
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Label one cluster from its representative queries. Never fails.
    pub async fn label(&self, queries: &[String]) -> LabelOutcome {
        if queries.is_empty() {
            return resolve_label(queries, None);
        }

        let prompt = build_prompt(queries);
        let generated = bounded(
            "generate_text",
            self.timeout,
            self.generator.generate_text(&prompt),
        )
        .await;
        if let Err(e) = &generated {
            warn!(error = %e, "label generation failed, using fallback");
        }

        let outcome = resolve_label(queries, Some(generated));
        debug!(label = outcome.text(), fallback = outcome.is_fallback(), "labeled cluster");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_queries_are_miscellaneous() {
        assert_eq!(
            resolve_label(&[], None),
            LabelOutcome::Labeled(MISC_LABEL.to_string())
        );
        // Even a generator reply is ignored without texts
        assert_eq!(resolve_label(&[], Some(Ok("Joins".into()))).text(), MISC_LABEL);
    }

    #[test]
    fn test_clean_label_strips_quotes_and_space() {
        assert_eq!(clean_label("  \"SQL Joins\"  "), "SQL Joins");
        assert_eq!(clean_label("'Graph Theory'\n"), "Graph Theory");
        assert_eq!(clean_label("\"' Mixed '\""), "Mixed");
        assert_eq!(clean_label("\"\""), "");
    }

    #[test]
    fn test_resolve_uses_cleaned_reply() {
        let queries = texts(&["what is a join?"]);
        let outcome = resolve_label(&queries, Some(Ok("\"Relational Joins\"".into())));
        assert_eq!(outcome, LabelOutcome::Labeled("Relational Joins".into()));
        assert!(!outcome.is_fallback());
    }

    #[test]
    fn test_resolve_falls_back_on_error_or_blank() {
        let queries = texts(&["how do I install the toolchain", "second"]);
        let expected =
            LabelOutcome::Fallback("Questions about how do I install the toolchain...".into());

        assert_eq!(
            resolve_label(&queries, Some(Err(Error::Generation("down".into())))),
            expected
        );
        assert_eq!(resolve_label(&queries, Some(Ok("  ''  ".into()))), expected);
        assert_eq!(resolve_label(&queries, None), expected);
    }

    #[test]
    fn test_fallback_truncates_by_chars() {
        let long = "a".repeat(80);
        assert_eq!(fallback_label(&long), format!("Questions about {}...", "a".repeat(50)));

        // Multi-byte characters count once each
        let accented = "é".repeat(60);
        let label = fallback_label(&accented);
        assert_eq!(label.chars().filter(|c| *c == 'é').count(), 50);
    }

    #[test]
    fn test_prompt_lists_first_five() {
        let queries: Vec<String> = (0..8).map(|i| format!("question {i}")).collect();
        let prompt = build_prompt(&queries);
        assert!(prompt.contains("- question 0\n- question 1"));
        assert!(prompt.contains("- question 4"));
        assert!(!prompt.contains("question 5"));
        assert!(prompt.contains("2-4 words"));
    }

    #[tokio::test]
    async fn test_labeler_uses_generator() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate_text()
            .withf(|prompt: &str| prompt.contains("- what is a b-tree"))
            .times(1)
            .returning(|_| Ok("'B-Tree Indexes'".to_string()));

        let labeler = ClusterLabeler::new(Arc::new(generator), Duration::from_secs(1));
        let outcome = labeler.label(&texts(&["what is a b-tree"])).await;
        assert_eq!(outcome, LabelOutcome::Labeled("B-Tree Indexes".into()));
    }

    #[tokio::test]
    async fn test_labeler_skips_generator_without_texts() {
        let mut generator = MockTextGenerator::new();
        generator.expect_generate_text().never();

        let labeler = ClusterLabeler::new(Arc::new(generator), Duration::from_secs(1));
        assert_eq!(labeler.label(&[]).await.text(), MISC_LABEL);
    }

    #[tokio::test]
    async fn test_unavailable_generator_falls_back() {
        let labeler = ClusterLabeler::new(Arc::new(UnavailableGenerator), Duration::from_secs(1));
        let outcome = labeler.label(&texts(&["why is my query slow"])).await;
        assert_eq!(outcome.into_text(), "Questions about why is my query slow...");
    }

    struct SlowGenerator;

    #[async_trait]
    impl TextGenerator for SlowGenerator {
        async fn generate_text(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("Too Late".into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_labeler_timeout_falls_back() {
        let labeler = ClusterLabeler::new(Arc::new(SlowGenerator), Duration::from_millis(100));
        let outcome = labeler.label(&texts(&["q"])).await;
        assert!(outcome.is_fallback());
        assert_eq!(outcome.text(), "Questions about q...");
    }
}
