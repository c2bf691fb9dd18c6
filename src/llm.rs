//! Completion provider abstraction.
//!
//! The classifier only needs "prompt in, text out". Two hosted providers
//! implement [`CompletionProvider`]:
//!
//! | Config value | Provider | Key | Default model |
//! |--------------|----------|-----|---------------|
//! | `gemini` | [`GeminiProvider`] | `GOOGLE_API_KEY` | `gemini-2.0-flash` |
//! | `openai` | [`OpenAIProvider`] | `OPENAI_API_KEY` | `gpt-4o-mini` |
//! | `auto` | whichever key is set, Gemini first | | |
//!
//! Both retry with exponential backoff on HTTP 429, 5xx, and network
//! errors, and fail immediately on any other 4xx.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::ClassifierConfig;
use crate::error::UpstreamError;
use crate::sources::fetch_json;

/// A text completion backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    OpenAI,
}

/// Decide which provider to use from the configured name and the keys
/// present in the environment.
pub fn resolve_provider_kind(
    provider: &str,
    google_key: Option<&str>,
    openai_key: Option<&str>,
) -> Result<ProviderKind> {
    let has = |key: Option<&str>| key.map(|k| !k.trim().is_empty()).unwrap_or(false);

    match provider {
        "gemini" if has(google_key) => Ok(ProviderKind::Gemini),
        "gemini" => Err(missing("Gemini", "GOOGLE_API_KEY")),
        "openai" if has(openai_key) => Ok(ProviderKind::OpenAI),
        "openai" => Err(missing("OpenAI", "OPENAI_API_KEY")),
        "auto" => {
            if has(google_key) {
                Ok(ProviderKind::Gemini)
            } else if has(openai_key) {
                Ok(ProviderKind::OpenAI)
            } else {
                Err(missing("LLM", "GOOGLE_API_KEY or OPENAI_API_KEY"))
            }
        }
        other => bail!(
            "Unknown classifier provider: '{}'. Must be auto, gemini, or openai.",
            other
        ),
    }
}

fn missing(service: &'static str, vars: &'static str) -> anyhow::Error {
    UpstreamError::MissingCredentials { service, vars }.into()
}

/// Build the provider selected by `config.provider`.
pub fn create_provider(config: &ClassifierConfig) -> Result<Box<dyn CompletionProvider>> {
    let google = std::env::var("GOOGLE_API_KEY").ok();
    let openai = std::env::var("OPENAI_API_KEY").ok();

    match resolve_provider_kind(&config.provider, google.as_deref(), openai.as_deref())? {
        ProviderKind::Gemini => Ok(Box::new(GeminiProvider::new(
            config,
            google.unwrap_or_default(),
        )?)),
        ProviderKind::OpenAI => Ok(Box::new(OpenAIProvider::new(
            config,
            openai.unwrap_or_default(),
        )?)),
    }
}

// ============ Gemini ============

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base: String,
    model: String,
    retry: RetryPolicy,
}

impl GeminiProvider {
    pub fn new(config: &ClassifierConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            base: config.gemini_base.trim_end_matches('/').to_string(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "gemini-2.0-flash".to_string()),
            retry: RetryPolicy::from_config(config),
        })
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base, self.model);
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.3 },
        });

        let json = send_with_retry("gemini", self.retry, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
        })
        .await?;

        Ok(parse_gemini_response(&json)?)
    }
}

fn parse_gemini_response(json: &Value) -> Result<String, UpstreamError> {
    json.pointer("/candidates/0/content/parts/0/text")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .ok_or_else(|| UpstreamError::Payload {
            service: "gemini",
            message: "missing candidates[0].content.parts[0].text".to_string(),
        })
}

// ============ OpenAI ============

pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    base: String,
    model: String,
    retry: RetryPolicy,
}

impl OpenAIProvider {
    pub fn new(config: &ClassifierConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            base: config.openai_base.trim_end_matches('/').to_string(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            retry: RetryPolicy::from_config(config),
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.3,
        });

        let url = format!("{}/chat/completions", self.base);
        let json = send_with_retry("openai", self.retry, || {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;

        Ok(parse_openai_response(&json)?)
    }
}

fn parse_openai_response(json: &Value) -> Result<String, UpstreamError> {
    json.pointer("/choices/0/message/content")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .ok_or_else(|| UpstreamError::Payload {
            service: "openai",
            message: "missing choices[0].message.content".to_string(),
        })
}

// ============ Retry ============

/// How many extra attempts a provider call gets, and the first backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based): the base delay
    /// doubled per attempt, at most 32 times the base.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << attempt.saturating_sub(1).min(5))
    }
}

/// Send the request built by `build` until it succeeds, a non-retryable
/// error occurs, or `max_retries` extra attempts are spent.
async fn send_with_retry<F>(
    service: &'static str,
    policy: RetryPolicy,
    build: F,
) -> Result<Value, UpstreamError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            tokio::time::sleep(policy.delay(attempt)).await;
        }

        match fetch_json(build(), service).await {
            Ok(json) => return Ok(json),
            Err(e) if e.is_retryable() => {
                tracing::warn!(service, attempt, error = %e, "retryable provider error");
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or(UpstreamError::Network {
        service,
        message: "retries exhausted".to_string(),
    }))
}
