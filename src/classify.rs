//! LLM classification of collected items.
//!
//! Each unclassified item is rendered into a prompt, sent to a
//! [`CompletionProvider`], and the reply is decoded strictly into a
//! [`Classification`]. Output that does not decode is committed as the
//! low-confidence fallback so the item is not retried forever; a provider
//! failure commits nothing and leaves the item for the next batch.

use anyhow::Result;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::collect::truncate_chars;
use crate::config::ClassifierConfig;
use crate::error::StoreError;
use crate::llm::CompletionProvider;
use crate::models::{Category, Classification, Item, MarketSize};
use crate::store::Store;

const PROMPT_TEMPLATE: &str = r#"Analyze this Reddit post for pain points and product opportunities.

**Subreddit:** r/{subreddit}
**Title:** {title}
**Post type:** {kind}
**Upvotes:** {score}
**Comments:** {num_comments}
**Content:**
{body}

---

Extract the following as JSON (no markdown, just raw JSON):
{
    "pain_point_summary": "One clear sentence describing the user's pain point or frustration",
    "category": "One of: {categories}",
    "severity": <1-5 integer, where 5 is extreme frustration>,
    "affected_audience": "Who experiences this problem (be specific)",
    "potential_solutions": ["Idea 1: brief description", "Idea 2: brief description", "Idea 3: brief description"],
    "market_size_estimate": "Small|Medium|Large - brief reasoning",
    "existing_solutions": ["Tool 1", "Tool 2"],
    "opportunity_score": <1-100 integer based on: severity * market size * lack of existing solutions * engagement>
}

Be practical and specific. Focus on actionable software/product ideas.
If the post doesn't contain a clear pain point, set opportunity_score to 10 or below and note that in the summary.
"#;

/// Fill the prompt template for `item`.
pub fn render_prompt(item: &Item, max_body_chars: usize) -> String {
    let score = item.score.to_string();
    let num_comments = item.num_comments.to_string();
    let categories = Category::joined_labels();

    fill_template(
        PROMPT_TEMPLATE,
        &[
            ("subreddit", item.subreddit.as_str()),
            ("title", item.title.as_str()),
            ("kind", item.kind.as_str()),
            ("score", score.as_str()),
            ("num_comments", num_comments.as_str()),
            ("categories", categories.as_str()),
            ("body", truncate_chars(&item.body, max_body_chars)),
        ],
    )
}

/// Substitute `{name}` placeholders in one left-to-right pass. Inserted
/// values are never scanned again; unknown braces are copied as-is.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let hit = values.iter().find(|(key, _)| {
            tail.strip_prefix(key)
                .is_some_and(|after| after.starts_with('}'))
        });
        match hit {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Remove a surrounding Markdown code fence, with or without a language
/// tag, and trim whitespace.
pub fn strip_code_fence(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest,
        };
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// The JSON object the model is asked to return. Every field is required.
#[derive(Debug, Deserialize)]
struct ModelAnalysis {
    pain_point_summary: String,
    category: String,
    severity: i64,
    affected_audience: String,
    potential_solutions: Vec<String>,
    market_size_estimate: String,
    existing_solutions: Vec<String>,
    opportunity_score: i64,
}

/// Result of decoding one model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    Parsed(Classification),
    Fallback(Classification),
}

impl Analysis {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Analysis::Fallback(_))
    }

    pub fn classification(&self) -> &Classification {
        match self {
            Analysis::Parsed(c) | Analysis::Fallback(c) => c,
        }
    }
}

/// Decode a raw model reply. The raw text is kept on the result either way.
pub fn analyze_response(raw: &str) -> Analysis {
    match serde_json::from_str::<ModelAnalysis>(strip_code_fence(raw)) {
        Ok(parsed) => Analysis::Parsed(Classification {
            pain_point_summary: parsed.pain_point_summary,
            category: Category::from_label(&parsed.category),
            severity: parsed.severity.clamp(1, 5),
            affected_audience: parsed.affected_audience,
            potential_solutions: parsed.potential_solutions,
            market_size: MarketSize::from_estimate(&parsed.market_size_estimate),
            existing_solutions: parsed.existing_solutions,
            opportunity_score: parsed.opportunity_score.clamp(1, 100),
            raw_llm_response: raw.to_string(),
        }),
        Err(e) => {
            tracing::debug!(error = %e, "model reply did not decode");
            Analysis::Fallback(Classification::fallback(raw))
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassifyOptions {
    pub prompt_body_chars: usize,
    pub delay: Duration,
}

impl ClassifyOptions {
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self {
            prompt_body_chars: config.prompt_body_chars,
            delay: Duration::from_millis(config.delay_ms),
        }
    }
}

/// Counters reported by [`Classifier::classify`].
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ClassifyStats {
    /// Items committed, fallbacks included.
    pub analyzed: i64,
    /// Of `analyzed`, how many were the parse-failure fallback.
    pub fallback: i64,
    /// Items left unclassified by a provider or store error.
    pub failed: i64,
}

pub struct Classifier {
    store: Store,
    provider: Arc<dyn CompletionProvider>,
    options: ClassifyOptions,
}

impl Classifier {
    pub fn new(store: Store, provider: Arc<dyn CompletionProvider>, options: ClassifyOptions) -> Self {
        Self {
            store,
            provider,
            options,
        }
    }

    /// Classify up to `batch_size` unclassified items, highest score first.
    pub async fn classify(&self, batch_size: usize) -> Result<ClassifyStats> {
        let items = self.store.list_unclassified(batch_size as i64).await?;
        let mut stats = ClassifyStats::default();

        if items.is_empty() {
            tracing::info!("no unclassified items");
            return Ok(stats);
        }

        tracing::info!(
            provider = self.provider.name(),
            model = self.provider.model(),
            batch = items.len(),
            "classifying"
        );

        for (i, item) in items.iter().enumerate() {
            if i > 0 && !self.options.delay.is_zero() {
                tokio::time::sleep(self.options.delay).await;
            }
            self.classify_one(item, &mut stats).await?;
        }

        tracing::info!(
            analyzed = stats.analyzed,
            fallback = stats.fallback,
            failed = stats.failed,
            "classification batch finished"
        );
        Ok(stats)
    }

    async fn classify_one(&self, item: &Item, stats: &mut ClassifyStats) -> Result<()> {
        let prompt = render_prompt(item, self.options.prompt_body_chars);

        let raw = match self.provider.complete(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(item = item.id.as_str(), error = %e, "provider call failed");
                stats.failed += 1;
                return Ok(());
            }
        };

        let analysis = analyze_response(&raw);
        match self
            .store
            .insert_classification(&item.id, analysis.classification())
            .await
        {
            Ok(_) => {
                stats.analyzed += 1;
                if analysis.is_fallback() {
                    tracing::warn!(item = item.id.as_str(), "stored fallback classification");
                    stats.fallback += 1;
                }
                Ok(())
            }
            Err(e @ (StoreError::AlreadyClassified(_) | StoreError::ItemNotFound(_))) => {
                tracing::error!(item = item.id.as_str(), error = %e, "classification rejected");
                stats.failed += 1;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
