//! Authenticated Reddit source.
//!
//! Uses the OAuth2 client-credentials ("application only") flow against
//! `https://www.reddit.com/api/v1/access_token`, then reads listings from
//! `https://oauth.reddit.com`. The token is cached until shortly before it
//! expires and dropped on a 401 so the next request re-authenticates.
//!
//! Credentials come from `REDDIT_CLIENT_ID` and `REDDIT_CLIENT_SECRET`.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::RedditConfig;
use crate::error::UpstreamError;
use crate::models::RawPost;
use crate::sources::{
    fetch_json, parse_listing, parse_replies, ContentSource, ListingKind, RedditRequest,
};

const SERVICE: &str = "reddit";

/// Refresh this long before the advertised expiry.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct RedditApiSource {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    api_base: String,
    token_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl RedditApiSource {
    /// Read credentials from the environment. Fails before any network
    /// traffic when either variable is missing or empty.
    pub fn from_env(config: &RedditConfig) -> Result<Self> {
        let client_id = std::env::var("REDDIT_CLIENT_ID").unwrap_or_default();
        let client_secret = std::env::var("REDDIT_CLIENT_SECRET").unwrap_or_default();

        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return Err(UpstreamError::MissingCredentials {
                service: "Reddit API",
                vars: "REDDIT_CLIENT_ID and REDDIT_CLIENT_SECRET (or use --public)",
            }
            .into());
        }

        Self::new(config, client_id, client_secret)
    }

    pub fn new(config: &RedditConfig, client_id: String, client_secret: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            client_id,
            client_secret,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token_url: config.token_url.clone(),
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, UpstreamError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_SLACK {
                return Ok(token.value.clone());
            }
        }

        let request = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")]);
        let json = fetch_json(request, SERVICE).await?;
        let token: TokenResponse =
            serde_json::from_value(json).map_err(|e| UpstreamError::Payload {
                service: SERVICE,
                message: format!("token response: {}", e),
            })?;

        tracing::debug!(expires_in = token.expires_in, "obtained reddit access token");

        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(value)
    }

    async fn get(&self, req: &RedditRequest) -> Result<Value> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.api_base, req.path);
        let request = self.client.get(&url).bearer_auth(token).query(&req.query);

        match fetch_json(request, SERVICE).await {
            Ok(json) => Ok(json),
            Err(e) => {
                if let UpstreamError::Status { status: 401, .. } = e {
                    *self.token.lock().await = None;
                }
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl ContentSource for RedditApiSource {
    fn name(&self) -> &str {
        "reddit-api"
    }

    async fn listing(
        &self,
        subreddit: &str,
        kind: ListingKind,
        limit: usize,
    ) -> Result<Vec<RawPost>> {
        let json = self
            .get(&RedditRequest::listing(subreddit, kind, limit))
            .await?;
        Ok(parse_listing(&json, subreddit))
    }

    async fn search(&self, subreddit: &str, query: &str, limit: usize) -> Result<Vec<RawPost>> {
        let json = self
            .get(&RedditRequest::search(subreddit, query, limit))
            .await?;
        Ok(parse_listing(&json, subreddit))
    }

    async fn replies(&self, post: &RawPost, limit: usize) -> Result<Vec<RawPost>> {
        let json = self
            .get(&RedditRequest::replies(&post.subreddit, post.bare_id(), limit))
            .await?;
        Ok(parse_replies(&json, &post.subreddit, limit))
    }
}
