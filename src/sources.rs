//! Content source abstraction.
//!
//! A [`ContentSource`] exposes the three read operations the collector
//! needs: a listing feed, a relevance search and, optionally, top-level
//! replies to a submission. Two Reddit implementations exist:
//!
//! | Source | Module | Auth |
//! |--------|--------|------|
//! | [`RedditApiSource`](crate::connector_reddit::RedditApiSource) | `connector_reddit` | OAuth2 client credentials |
//! | [`PublicJsonSource`](crate::connector_public::PublicJsonSource) | `connector_public` | none |
//!
//! Both speak the same Reddit "Listing" JSON, parsed here into [`RawPost`].

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::Config;
use crate::connector_public::PublicJsonSource;
use crate::connector_reddit::RedditApiSource;
use crate::error::UpstreamError;
use crate::models::{ItemKind, RawPost};

/// Feeds requested for every collection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    Hot,
    New,
    TopWeek,
}

impl ListingKind {
    pub const ALL: [ListingKind; 3] = [ListingKind::Hot, ListingKind::New, ListingKind::TopWeek];

    pub fn as_str(&self) -> &'static str {
        match self {
            ListingKind::Hot => "hot",
            ListingKind::New => "new",
            ListingKind::TopWeek => "top_week",
        }
    }

    fn segment(&self) -> &'static str {
        match self {
            ListingKind::Hot => "hot",
            ListingKind::New => "new",
            ListingKind::TopWeek => "top",
        }
    }
}

/// Search results per term are capped regardless of the listing limit.
pub const MAX_SEARCH_LIMIT: usize = 25;

/// An upstream feed of posts.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Short identifier used in logs (e.g. `"reddit-api"`).
    fn name(&self) -> &str;

    /// Fetch a listing feed for a collection.
    async fn listing(&self, subreddit: &str, kind: ListingKind, limit: usize)
        -> Result<Vec<RawPost>>;

    /// Relevance search within a collection over the last month.
    async fn search(&self, subreddit: &str, query: &str, limit: usize) -> Result<Vec<RawPost>>;

    /// Top-level replies to a submission. Sources without reply support
    /// return nothing.
    async fn replies(&self, _post: &RawPost, _limit: usize) -> Result<Vec<RawPost>> {
        Ok(Vec::new())
    }
}

/// Build the configured Reddit source.
///
/// The authenticated source reads its credentials here, so a missing
/// `REDDIT_CLIENT_ID`/`REDDIT_CLIENT_SECRET` fails before any fetch.
pub fn create_source(config: &Config, public: bool) -> Result<Arc<dyn ContentSource>> {
    if public {
        Ok(Arc::new(PublicJsonSource::new(&config.reddit)?))
    } else {
        Ok(Arc::new(RedditApiSource::from_env(&config.reddit)?))
    }
}

// ============ Request shapes ============

/// Path and query for one Reddit read, shared by both connectors.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RedditRequest {
    /// Path without a `.json` suffix, e.g. `/r/SaaS/hot`.
    pub path: String,
    pub query: Vec<(&'static str, String)>,
}

impl RedditRequest {
    pub fn listing(subreddit: &str, kind: ListingKind, limit: usize) -> Self {
        let mut query = vec![("limit", limit.to_string()), ("raw_json", "1".to_string())];
        if kind == ListingKind::TopWeek {
            query.push(("t", "week".to_string()));
        }
        Self {
            path: format!("/r/{}/{}", subreddit, kind.segment()),
            query,
        }
    }

    pub fn search(subreddit: &str, term: &str, limit: usize) -> Self {
        Self {
            path: format!("/r/{}/search", subreddit),
            query: vec![
                ("q", term.to_string()),
                ("restrict_sr", "on".to_string()),
                ("sort", "relevance".to_string()),
                ("t", "month".to_string()),
                ("limit", limit.min(MAX_SEARCH_LIMIT).to_string()),
                ("raw_json", "1".to_string()),
            ],
        }
    }

    pub fn replies(subreddit: &str, post_id: &str, limit: usize) -> Self {
        Self {
            path: format!("/r/{}/comments/{}", subreddit, post_id),
            query: vec![
                ("limit", limit.to_string()),
                ("depth", "1".to_string()),
                ("sort", "top".to_string()),
                ("raw_json", "1".to_string()),
            ],
        }
    }
}

/// Send a request and decode a JSON body, mapping failures to [`UpstreamError`].
pub(crate) async fn fetch_json(
    request: reqwest::RequestBuilder,
    service: &'static str,
) -> Result<Value, UpstreamError> {
    let response = request.send().await.map_err(|e| UpstreamError::Network {
        service,
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(UpstreamError::Status {
            service,
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        });
    }

    response.json().await.map_err(|e| UpstreamError::Payload {
        service,
        message: e.to_string(),
    })
}

// ============ Listing parsing ============

/// Parse a Reddit `Listing` object into posts. Unknown thing kinds
/// (e.g. `more`) are skipped.
pub fn parse_listing(listing: &Value, subreddit: &str) -> Vec<RawPost> {
    listing
        .get("data")
        .and_then(|d| d.get("children"))
        .and_then(|c| c.as_array())
        .map(|children| {
            children
                .iter()
                .filter_map(|child| parse_thing(child, subreddit))
                .collect()
        })
        .unwrap_or_default()
}

/// Parse the `[submission, comments]` pair returned by the comments
/// endpoint, keeping at most `limit` top-level replies.
pub fn parse_replies(payload: &Value, subreddit: &str, limit: usize) -> Vec<RawPost> {
    let Some(comments) = payload.as_array().and_then(|pair| pair.get(1)) else {
        return Vec::new();
    };

    parse_listing(comments, subreddit)
        .into_iter()
        .filter(|post| post.kind == ItemKind::Comment)
        .take(limit)
        .collect()
}

fn parse_thing(child: &Value, subreddit: &str) -> Option<RawPost> {
    let kind = match child.get("kind").and_then(|k| k.as_str())? {
        "t3" => ItemKind::Submission,
        "t1" => ItemKind::Comment,
        _ => return None,
    };
    let data = child.get("data")?;

    let external_id = match str_field(data, "name") {
        Some(name) if !name.is_empty() => name,
        _ => format!("{}_{}", kind.prefix(), str_field(data, "id")?),
    };

    let body_key = match kind {
        ItemKind::Submission => "selftext",
        ItemKind::Comment => "body",
    };

    // Only keep replies directly under the submission
    let parent_external_id = match kind {
        ItemKind::Submission => None,
        ItemKind::Comment => {
            let link = str_field(data, "link_id");
            let parent = str_field(data, "parent_id");
            if parent.is_some() && link.is_some() && parent != link {
                return None;
            }
            link.or(parent)
        }
    };

    Some(RawPost {
        external_id,
        kind,
        subreddit: str_field(data, "subreddit").unwrap_or_else(|| subreddit.to_string()),
        title: str_field(data, "title").unwrap_or_default(),
        body: str_field(data, body_key).unwrap_or_default(),
        author: str_field(data, "author").unwrap_or_else(|| "[deleted]".to_string()),
        permalink: str_field(data, "permalink").unwrap_or_default(),
        score: int_field(data, "score"),
        num_comments: int_field(data, "num_comments"),
        created_utc: data
            .get("created_utc")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0),
        parent_external_id,
    })
}

fn str_field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn int_field(data: &Value, key: &str) -> i64 {
    data.get(key)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing() -> Value {
        json!({
            "kind": "Listing",
            "data": {
                "children": [
                    {
                        "kind": "t3",
                        "data": {
                            "name": "t3_abc",
                            "id": "abc",
                            "subreddit": "SaaS",
                            "title": "I wish invoicing was easier",
                            "selftext": "So frustrated",
                            "author": "founder",
                            "permalink": "/r/SaaS/comments/abc/i_wish/",
                            "score": 42,
                            "num_comments": 7,
                            "created_utc": 1700000000.0
                        }
                    },
                    { "kind": "t3", "data": { "id": "def", "title": "no name field" } },
                    { "kind": "more", "data": { "children": ["x"] } }
                ]
            }
        })
    }

    #[test]
    fn parses_submissions_and_skips_unknown_kinds() {
        let posts = parse_listing(&listing(), "fallback");
        assert_eq!(posts.len(), 2);

        let first = &posts[0];
        assert_eq!(first.external_id, "t3_abc");
        assert_eq!(first.kind, ItemKind::Submission);
        assert_eq!(first.subreddit, "SaaS");
        assert_eq!(first.body, "So frustrated");
        assert_eq!(first.score, 42);
        assert_eq!(first.num_comments, 7);
        assert_eq!(first.created_utc, 1_700_000_000.0);

        // Missing fullname is rebuilt from kind + id
        let second = &posts[1];
        assert_eq!(second.external_id, "t3_def");
        assert_eq!(second.subreddit, "fallback");
        assert_eq!(second.author, "[deleted]");
    }

    #[test]
    fn malformed_listing_is_empty() {
        assert!(parse_listing(&json!({"error": 403}), "SaaS").is_empty());
        assert!(parse_listing(&json!([]), "SaaS").is_empty());
    }

    #[test]
    fn replies_keep_top_level_comments_only() {
        let payload = json!([
            { "kind": "Listing", "data": { "children": [] } },
            {
                "kind": "Listing",
                "data": {
                    "children": [
                        { "kind": "t1", "data": { "name": "t1_c1", "body": "I wish", "link_id": "t3_abc", "parent_id": "t3_abc", "score": 3 } },
                        { "kind": "t1", "data": { "name": "t1_c2", "body": "nested", "link_id": "t3_abc", "parent_id": "t1_c1" } },
                        { "kind": "t1", "data": { "name": "t1_c3", "body": "tired of it", "link_id": "t3_abc", "parent_id": "t3_abc" } },
                        { "kind": "more", "data": {} }
                    ]
                }
            }
        ]);

        let replies = parse_replies(&payload, "SaaS", 10);
        let ids: Vec<&str> = replies.iter().map(|r| r.external_id.as_str()).collect();
        assert_eq!(ids, vec!["t1_c1", "t1_c3"]);
        assert_eq!(replies[0].parent_external_id.as_deref(), Some("t3_abc"));
        assert_eq!(replies[0].body, "I wish");

        assert_eq!(parse_replies(&payload, "SaaS", 1).len(), 1);
    }

    #[test]
    fn search_limit_is_capped() {
        let req = RedditRequest::search("SaaS", "I wish", 50);
        assert_eq!(req.path, "/r/SaaS/search");
        assert!(req.query.contains(&("limit", "25".to_string())));
        assert!(req.query.contains(&("restrict_sr", "on".to_string())));
    }

    #[test]
    fn top_listing_uses_week_window() {
        let req = RedditRequest::listing("SaaS", ListingKind::TopWeek, 10);
        assert_eq!(req.path, "/r/SaaS/top");
        assert!(req.query.contains(&("t", "week".to_string())));
        let hot = RedditRequest::listing("SaaS", ListingKind::Hot, 10);
        assert!(!hot.query.iter().any(|(k, _)| *k == "t"));
    }
}
