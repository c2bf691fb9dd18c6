//! Pain-signal filter.
//!
//! A case-insensitive substring test against a list of phrase markers. It
//! only gates admission at collection time; stored items are never
//! re-filtered.

use crate::config::CollectorConfig;

/// Phrases that usually accompany a complaint or an unmet need.
pub const DEFAULT_MARKERS: &[&str] = &[
    "i wish",
    "frustrated",
    "annoying",
    "why isn't there",
    "looking for",
    "need a tool",
    "hate when",
    "pain point",
    "struggle with",
    "wish there was",
    "anyone know of",
    "alternative to",
    "tired of",
    "can't find",
    "doesn't exist",
    "would pay for",
    "shut up and take my money",
    "feature request",
    "deal breaker",
    "broken",
    "sucks",
    "terrible",
    "worst part",
    "is there a",
    "recommend a",
    "help me find",
    "what do you use for",
    "so annoying",
    "drives me crazy",
    "waste of time",
    "looking for something",
];

#[derive(Debug, Clone)]
pub struct PainFilter {
    markers: Vec<String>,
}

impl PainFilter {
    /// Build a filter from arbitrary markers. Markers are lowercased once
    /// here; blank markers are dropped so they cannot match everything.
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let markers = markers
            .into_iter()
            .map(|m| m.as_ref().trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        Self { markers }
    }

    pub fn from_config(config: &CollectorConfig) -> Self {
        Self::new(&config.markers)
    }

    /// True if any marker occurs anywhere in `text`.
    pub fn matches(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.markers.iter().any(|m| lower.contains(m.as_str()))
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }
}

impl Default for PainFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MARKERS)
    }
}
