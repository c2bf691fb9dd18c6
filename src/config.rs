//! TOML configuration.
//!
//! Every tunable has a default, so a missing file yields a working
//! [`Config::minimal`]. Credentials never live in the file: they are read
//! from the environment by the connectors and providers that need them.
//!
//! ```toml
//! [db]
//! path = "./data/painpoints.sqlite"
//!
//! [collector]
//! subreddits = ["SaaS", "startups"]
//! limit = 50
//!
//! [classifier]
//! provider = "auto"      # auto | gemini | openai
//! batch_size = 20
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::filter::DEFAULT_MARKERS;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub reddit: RedditConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/painpoints.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectorConfig {
    #[serde(default = "default_subreddits")]
    pub subreddits: Vec<String>,
    /// Items requested per listing.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Pause between requests against the authenticated API.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Pause between requests against the public JSON endpoints, which
    /// throttle unauthenticated clients to roughly ten requests a minute.
    #[serde(default = "default_public_request_delay_ms")]
    pub public_request_delay_ms: u64,
    #[serde(default = "default_max_body_chars")]
    pub max_body_chars: usize,
    #[serde(default = "default_max_comment_chars")]
    pub max_comment_chars: usize,
    /// Top-level replies inspected per matching submission. 0 disables.
    #[serde(default = "default_max_comments")]
    pub max_comments: usize,
    #[serde(default = "default_search_terms")]
    pub search_terms: Vec<String>,
    #[serde(default = "default_markers")]
    pub markers: Vec<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            subreddits: default_subreddits(),
            limit: default_limit(),
            request_delay_ms: default_request_delay_ms(),
            public_request_delay_ms: default_public_request_delay_ms(),
            max_body_chars: default_max_body_chars(),
            max_comment_chars: default_max_comment_chars(),
            max_comments: default_max_comments(),
            search_terms: default_search_terms(),
            markers: default_markers(),
        }
    }
}

fn default_subreddits() -> Vec<String> {
    [
        "SaaS",
        "startups",
        "Entrepreneur",
        "smallbusiness",
        "webdev",
        "programming",
        "productivity",
        "selfhosted",
        "sideproject",
        "indiehackers",
        "digitalnomad",
        "nocode",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_limit() -> usize {
    50
}
fn default_request_delay_ms() -> u64 {
    1000
}
fn default_public_request_delay_ms() -> u64 {
    2000
}
fn default_max_body_chars() -> usize {
    5000
}
fn default_max_comment_chars() -> usize {
    3000
}
fn default_max_comments() -> usize {
    10
}
fn default_search_terms() -> Vec<String> {
    [
        "I wish",
        "frustrated with",
        "need a tool",
        "looking for",
        "alternative to",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_markers() -> Vec<String> {
    DEFAULT_MARKERS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedditConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_public_base")]
    pub public_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            api_base: default_api_base(),
            token_url: default_token_url(),
            public_base: default_public_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_user_agent() -> String {
    "pain-point-discovery:v1.0 (research tool)".to_string()
}
fn default_api_base() -> String {
    "https://oauth.reddit.com".to_string()
}
fn default_token_url() -> String {
    "https://www.reddit.com/api/v1/access_token".to_string()
}
fn default_public_base() -> String {
    "https://www.reddit.com".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    /// `auto`, `gemini`, or `openai`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_prompt_body_chars")]
    pub prompt_body_chars: usize,
    #[serde(default = "default_classify_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff delay; doubles per retry.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_gemini_base")]
    pub gemini_base: String,
    #[serde(default = "default_openai_base")]
    pub openai_base: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            batch_size: default_batch_size(),
            prompt_body_chars: default_prompt_body_chars(),
            delay_ms: default_classify_delay_ms(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            gemini_base: default_gemini_base(),
            openai_base: default_openai_base(),
        }
    }
}

fn default_provider() -> String {
    "auto".to_string()
}
fn default_batch_size() -> usize {
    20
}
fn default_prompt_body_chars() -> usize {
    3000
}
fn default_classify_delay_ms() -> u64 {
    1000
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_ms() -> u64 {
    1000
}
fn default_gemini_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Classification batch size used by `POST /api/scrape`.
    #[serde(default = "default_background_batch_size")]
    pub background_batch_size: usize,
    /// Whether `POST /api/scrape` collects through the public JSON endpoints.
    #[serde(default)]
    pub background_public: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            background_batch_size: default_background_batch_size(),
            background_public: false,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_background_batch_size() -> usize {
    50
}

impl Config {
    /// All defaults. Used when no config file exists.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig::default(),
            collector: CollectorConfig::default(),
            reddit: RedditConfig::default(),
            classifier: ClassifierConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Load configuration from `path`, falling back to [`Config::minimal`]
/// when the file does not exist. `SUBREDDITS` and `DATABASE_PATH` in the
/// environment override the file.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::minimal()
    };

    apply_env_overrides(&mut config);
    validate(&config)?;
    Ok(config)
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config")?;
    validate(&config)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(subs) = std::env::var("SUBREDDITS") {
        let subs = split_list(&subs);
        if !subs.is_empty() {
            config.collector.subreddits = subs;
        }
    }
    if let Ok(path) = std::env::var("DATABASE_PATH") {
        if !path.trim().is_empty() {
            config.db.path = PathBuf::from(path);
        }
    }
}

/// Split a comma-separated list, trimming entries and dropping empties.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate(config: &Config) -> Result<()> {
    if config.collector.limit == 0 {
        bail!("collector.limit must be > 0");
    }
    if config.collector.max_body_chars == 0 || config.collector.max_comment_chars == 0 {
        bail!("collector.max_body_chars and collector.max_comment_chars must be > 0");
    }
    if config.classifier.batch_size == 0 {
        bail!("classifier.batch_size must be > 0");
    }
    if config.classifier.prompt_body_chars == 0 {
        bail!("classifier.prompt_body_chars must be > 0");
    }
    if config.server.background_batch_size == 0 {
        bail!("server.background_batch_size must be > 0");
    }

    match config.classifier.provider.as_str() {
        "auto" | "gemini" | "openai" => {}
        other => bail!(
            "Unknown classifier provider: '{}'. Must be auto, gemini, or openai.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.collector.limit, 50);
        assert_eq!(config.collector.subreddits.len(), 12);
        assert_eq!(config.classifier.provider, "auto");
        assert_eq!(config.classifier.prompt_body_chars, 3000);
        assert_eq!(config.collector.max_body_chars, 5000);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = parse_config(
            r#"
            [collector]
            subreddits = ["rust"]

            [classifier]
            provider = "openai"
            model = "gpt-4o-mini"
            "#,
        )
        .unwrap();
        assert_eq!(config.collector.subreddits, vec!["rust"]);
        assert_eq!(config.collector.max_comments, 10);
        assert_eq!(config.classifier.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.classifier.openai_base, "https://api.openai.com/v1");
        assert_eq!(config.classifier.retry_base_ms, 1000);
        assert_eq!(config.classifier.batch_size, 20);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = parse_config("[classifier]\nprovider = \"llama\"").unwrap_err();
        assert!(err.to_string().contains("Unknown classifier provider"));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(parse_config("[classifier]\nbatch_size = 0").is_err());
    }

    #[test]
    fn split_list_trims_and_drops_empty() {
        assert_eq!(split_list(" SaaS, ,webdev ,"), vec!["SaaS", "webdev"]);
        assert!(split_list("").is_empty());
    }
}
