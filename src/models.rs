//! Core data models.
//!
//! [`RawPost`] is what a content source returns, [`NewItem`] is what the
//! collector stores, and [`Classification`] is what the classifier commits.
//! [`ClassifiedItem`] is the joined read model served by the query surface.

use serde::{Deserialize, Serialize};

/// Whether an item is a top-level submission or a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Submission,
    Comment,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Submission => "submission",
            ItemKind::Comment => "comment",
        }
    }

    /// Reddit "thing" prefix used to namespace ids of this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            ItemKind::Submission => "t3",
            ItemKind::Comment => "t1",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "comment" => ItemKind::Comment,
            _ => ItemKind::Submission,
        }
    }
}

/// An item as returned by a content source, before filtering.
#[derive(Debug, Clone)]
pub struct RawPost {
    /// Kind-namespaced id, e.g. `t3_abc123` or `t1_def456`.
    pub external_id: String,
    pub kind: ItemKind,
    pub subreddit: String,
    pub title: String,
    pub body: String,
    pub author: String,
    /// Path beginning with `/r/...`.
    pub permalink: String,
    pub score: i64,
    pub num_comments: i64,
    pub created_utc: f64,
    /// For comments, the external id of the submission they belong to.
    pub parent_external_id: Option<String>,
}

impl RawPost {
    /// The id without its kind prefix.
    pub fn bare_id(&self) -> &str {
        self.external_id
            .split_once('_')
            .map(|(_, id)| id)
            .unwrap_or(&self.external_id)
    }

    pub fn url(&self) -> String {
        if self.permalink.starts_with("http") {
            self.permalink.clone()
        } else {
            format!("https://reddit.com{}", self.permalink)
        }
    }
}

/// An item ready to be inserted into the store.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub external_id: String,
    pub subreddit: String,
    pub title: String,
    pub body: String,
    pub author: String,
    pub url: String,
    pub score: i64,
    pub num_comments: i64,
    pub created_utc: i64,
    pub kind: ItemKind,
    pub parent_external_id: Option<String>,
}

/// A stored item.
#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub id: String,
    pub external_id: String,
    pub subreddit: String,
    pub title: String,
    pub body: String,
    pub author: String,
    pub url: String,
    pub score: i64,
    pub num_comments: i64,
    pub created_utc: i64,
    pub kind: ItemKind,
    pub parent_external_id: Option<String>,
    pub collected_at: i64,
    pub classified: bool,
}

/// Fixed category set the model must choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Productivity,
    #[serde(rename = "Developer Tools")]
    DeveloperTools,
    Business,
    Communication,
    Finance,
    Health,
    Education,
    Marketing,
    Design,
    #[serde(rename = "Data & Analytics")]
    DataAnalytics,
    Automation,
    Other,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Category::Productivity,
        Category::DeveloperTools,
        Category::Business,
        Category::Communication,
        Category::Finance,
        Category::Health,
        Category::Education,
        Category::Marketing,
        Category::Design,
        Category::DataAnalytics,
        Category::Automation,
        Category::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Productivity => "Productivity",
            Category::DeveloperTools => "Developer Tools",
            Category::Business => "Business",
            Category::Communication => "Communication",
            Category::Finance => "Finance",
            Category::Health => "Health",
            Category::Education => "Education",
            Category::Marketing => "Marketing",
            Category::Design => "Design",
            Category::DataAnalytics => "Data & Analytics",
            Category::Automation => "Automation",
            Category::Other => "Other",
        }
    }

    /// Case-insensitive lookup by label. Anything unrecognised is `Other`.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.label().eq_ignore_ascii_case(label))
            .unwrap_or(Category::Other)
    }

    /// `"Productivity, Developer Tools, ..."` for prompt interpolation.
    pub fn joined_labels() -> String {
        Self::ALL
            .iter()
            .map(|c| c.label())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Qualitative market-size tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketTier {
    Small,
    Medium,
    Large,
    Unknown,
}

impl MarketTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketTier::Small => "Small",
            MarketTier::Medium => "Medium",
            MarketTier::Large => "Large",
            MarketTier::Unknown => "Unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => MarketTier::Small,
            "medium" => MarketTier::Medium,
            "large" => MarketTier::Large,
            _ => MarketTier::Unknown,
        }
    }
}

/// Market-size estimate: tier plus the model's justification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketSize {
    pub tier: MarketTier,
    /// Full estimate text as produced, e.g. `"Large - every SaaS needs this"`.
    pub estimate: String,
}

impl MarketSize {
    /// Parse `"Tier - reasoning"`. The tier is the leading word; a missing or
    /// unrecognised tier yields [`MarketTier::Unknown`].
    pub fn from_estimate(estimate: &str) -> Self {
        let estimate = estimate.trim();
        let head = estimate
            .split(|c: char| c == '-' || c == ':' || c == '(' || c.is_whitespace())
            .next()
            .unwrap_or("");
        Self {
            tier: MarketTier::parse(head),
            estimate: estimate.to_string(),
        }
    }

    pub fn unknown() -> Self {
        Self {
            tier: MarketTier::Unknown,
            estimate: "Unknown".to_string(),
        }
    }
}

/// Structured analysis of one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub pain_point_summary: String,
    pub category: Category,
    /// 1–5.
    pub severity: i64,
    pub affected_audience: String,
    pub potential_solutions: Vec<String>,
    pub market_size: MarketSize,
    pub existing_solutions: Vec<String>,
    /// 1–100 for parsed results; 0 marks the parse-failure fallback.
    pub opportunity_score: i64,
    pub raw_llm_response: String,
}

pub const FALLBACK_SUMMARY: &str = "Analysis failed - could not parse LLM response";

impl Classification {
    /// Low-confidence result committed when the model output cannot be parsed.
    pub fn fallback(raw_llm_response: impl Into<String>) -> Self {
        Self {
            pain_point_summary: FALLBACK_SUMMARY.to_string(),
            category: Category::Other,
            severity: 1,
            affected_audience: "Unknown".to_string(),
            potential_solutions: Vec::new(),
            market_size: MarketSize::unknown(),
            existing_solutions: Vec::new(),
            opportunity_score: 0,
            raw_llm_response: raw_llm_response.into(),
        }
    }
}

/// An item joined with its classification.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedItem {
    #[serde(flatten)]
    pub item: Item,
    pub pain_point_summary: String,
    pub category: String,
    pub severity: i64,
    pub affected_audience: String,
    pub potential_solutions: Vec<String>,
    pub market_size_tier: String,
    pub market_size_estimate: String,
    pub existing_solutions: Vec<String>,
    pub opportunity_score: i64,
    pub classified_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_llm_response: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubredditCount {
    pub subreddit: String,
    pub count: i64,
}

/// Aggregate counts over the store.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_items: i64,
    pub classified_items: i64,
    pub categories: Vec<CategoryCount>,
    pub subreddits: Vec<SubredditCount>,
    pub avg_opportunity_score: f64,
    pub top_opportunity_score: i64,
}

/// One collection pass, kept for diagnosis.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: String,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub subreddits: Vec<String>,
    pub items_found: i64,
    pub items_matched: i64,
    pub source_errors: i64,
    pub status: String,
}
