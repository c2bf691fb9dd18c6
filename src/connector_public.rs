//! Unauthenticated Reddit source.
//!
//! Reads the public `.json` views of listing, search and comment pages.
//! No credentials are needed, but Reddit throttles these endpoints hard,
//! so the collector spaces requests further apart for this source.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::RedditConfig;
use crate::models::RawPost;
use crate::sources::{
    fetch_json, parse_listing, parse_replies, ContentSource, ListingKind, RedditRequest,
};

const SERVICE: &str = "reddit-public";

pub struct PublicJsonSource {
    client: reqwest::Client,
    base: String,
}

impl PublicJsonSource {
    pub fn new(config: &RedditConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base: config.public_base.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, req: &RedditRequest) -> String {
        format!("{}{}.json", self.base, req.path)
    }

    async fn get(&self, req: &RedditRequest) -> Result<Value> {
        let request = self.client.get(self.url_for(req)).query(&req.query);
        Ok(fetch_json(request, SERVICE).await?)
    }
}

#[async_trait]
impl ContentSource for PublicJsonSource {
    fn name(&self) -> &str {
        "reddit-public"
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_use_json_suffix() {
        let source = PublicJsonSource::new(&RedditConfig::default()).unwrap();
        let req = RedditRequest::listing("SaaS", ListingKind::New, 5);
        assert_eq!(source.url_for(&req), "https://www.reddit.com/r/SaaS/new.json");

        let req = RedditRequest::replies("SaaS", "abc", 10);
        assert_eq!(
            source.url_for(&req),
            "https://www.reddit.com/r/SaaS/comments/abc.json"
        );
    }
}
