//! Collection pass.
//!
//! For every subreddit: fetch the hot, new and top-of-week listings plus
//! one search per configured term, deduplicate by external id, keep what
//! passes the [`PainFilter`], and insert it. Matching submissions also get
//! their top-level replies inspected.
//!
//! A failing fetch is logged and counted; the pass carries on with the
//! next request. Each pass is recorded in `collection_runs`.

use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CollectorConfig;
use crate::filter::PainFilter;
use crate::models::{ItemKind, NewItem, RawPost};
use crate::sources::{ContentSource, ListingKind};
use crate::store::Store;

/// Tunables for one collector.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub request_delay: Duration,
    pub max_body_chars: usize,
    pub max_comment_chars: usize,
    pub max_comments: usize,
    pub search_terms: Vec<String>,
}

impl CollectOptions {
    /// The public endpoints get the longer delay.
    pub fn from_config(config: &CollectorConfig, public: bool) -> Self {
        let delay_ms = if public {
            config.public_request_delay_ms
        } else {
            config.request_delay_ms
        };
        Self {
            request_delay: Duration::from_millis(delay_ms),
            max_body_chars: config.max_body_chars,
            max_comment_chars: config.max_comment_chars,
            max_comments: config.max_comments,
            search_terms: config.search_terms.clone(),
        }
    }
}

/// Counters reported by [`Collector::collect`].
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CollectStats {
    /// Distinct items seen across all fetches.
    pub found: i64,
    /// Items (submissions and replies) that passed the filter and were stored.
    pub matched: i64,
    pub source_errors: i64,
    pub sources_collected: i64,
}

pub struct Collector {
    store: Store,
    source: Arc<dyn ContentSource>,
    filter: PainFilter,
    options: CollectOptions,
}

impl Collector {
    pub fn new(
        store: Store,
        source: Arc<dyn ContentSource>,
        filter: PainFilter,
        options: CollectOptions,
    ) -> Self {
        Self {
            store,
            source,
            filter,
            options,
        }
    }

    /// Run one collection pass over `subreddits`.
    pub async fn collect(&self, subreddits: &[String], limit: usize) -> Result<CollectStats> {
        let subreddits: Vec<String> = subreddits
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let run_id = self.store.begin_run(&subreddits).await?;
        let mut stats = CollectStats::default();

        let mut outcome = Ok(());
        for (i, subreddit) in subreddits.iter().enumerate() {
            if i > 0 {
                self.pause().await;
            }
            if let Err(e) = self.collect_one(subreddit, limit, &mut stats).await {
                outcome = Err(e);
                break;
            }
            stats.sources_collected += 1;
        }

        let status = if outcome.is_ok() { "completed" } else { "failed" };
        self.store
            .finish_run(
                &run_id,
                stats.found,
                stats.matched,
                stats.source_errors,
                status,
            )
            .await?;
        outcome?;

        tracing::info!(
            source = self.source.name(),
            found = stats.found,
            matched = stats.matched,
            errors = stats.source_errors,
            "collection pass finished"
        );
        Ok(stats)
    }

    /// Fetch, dedup, filter and store one subreddit. Only store errors
    /// propagate; fetch errors are counted.
    async fn collect_one(
        &self,
        subreddit: &str,
        limit: usize,
        stats: &mut CollectStats,
    ) -> Result<()> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates: Vec<RawPost> = Vec::new();
        let mut first = true;

        for kind in ListingKind::ALL {
            if !first {
                self.pause().await;
            }
            first = false;
            match self.source.listing(subreddit, kind, limit).await {
                Ok(posts) => merge(&mut seen, &mut candidates, posts),
                Err(e) => {
                    tracing::warn!(subreddit, listing = kind.as_str(), error = %e, "listing fetch failed");
                    stats.source_errors += 1;
                }
            }
        }

        for term in &self.options.search_terms {
            self.pause().await;
            match self.source.search(subreddit, term, limit).await {
                Ok(posts) => merge(&mut seen, &mut candidates, posts),
                Err(e) => {
                    tracing::warn!(subreddit, term = term.as_str(), error = %e, "search failed");
                    stats.source_errors += 1;
                }
            }
        }

        stats.found += candidates.len() as i64;
        let mut matched = 0i64;

        for post in &candidates {
            let text = format!("{} {}", post.title, post.body);
            if !self.filter.matches(&text) {
                continue;
            }

            let limit = match post.kind {
                ItemKind::Submission => self.options.max_body_chars,
                ItemKind::Comment => self.options.max_comment_chars,
            };
            self.store.insert_item(&to_new_item(post, None, limit)).await?;
            matched += 1;

            if post.kind == ItemKind::Submission && self.options.max_comments > 0 {
                self.pause().await;
                matched += self.collect_replies(post, &mut seen, stats).await?;
            }
        }

        stats.matched += matched;
        tracing::info!(
            subreddit,
            candidates = candidates.len(),
            matched,
            "collected subreddit"
        );
        Ok(())
    }

    async fn collect_replies(
        &self,
        post: &RawPost,
        seen: &mut HashSet<String>,
        stats: &mut CollectStats,
    ) -> Result<i64> {
        let replies = match self.source.replies(post, self.options.max_comments).await {
            Ok(replies) => replies,
            Err(e) => {
                tracing::warn!(post = post.external_id.as_str(), error = %e, "reply fetch failed");
                stats.source_errors += 1;
                return Ok(0);
            }
        };

        let mut matched = 0;
        for reply in replies.iter().take(self.options.max_comments) {
            if !seen.insert(reply.external_id.clone()) {
                continue;
            }
            stats.found += 1;
            if !self.filter.matches(&reply.body) {
                continue;
            }
            let item = to_new_item(reply, Some(post), self.options.max_comment_chars);
            self.store.insert_item(&item).await?;
            matched += 1;
        }
        Ok(matched)
    }

    async fn pause(&self) {
        if !self.options.request_delay.is_zero() {
            tokio::time::sleep(self.options.request_delay).await;
        }
    }
}

fn merge(seen: &mut HashSet<String>, candidates: &mut Vec<RawPost>, posts: Vec<RawPost>) {
    for post in posts {
        if seen.insert(post.external_id.clone()) {
            candidates.push(post);
        }
    }
}

/// Replies inherit the submission's title and point back at it.
fn to_new_item(post: &RawPost, parent: Option<&RawPost>, max_chars: usize) -> NewItem {
    let (title, parent_external_id) = match parent {
        Some(parent) => (parent.title.clone(), Some(parent.external_id.clone())),
        None => (post.title.clone(), post.parent_external_id.clone()),
    };

    NewItem {
        external_id: post.external_id.clone(),
        subreddit: post.subreddit.clone(),
        title,
        body: truncate_chars(&post.body, max_chars).to_string(),
        author: post.author.clone(),
        url: post.url(),
        score: post.score,
        num_comments: post.num_comments,
        created_utc: post.created_utc as i64,
        kind: post.kind,
        parent_external_id,
    }
}

/// The first `max_chars` characters of `s`, cut on a char boundary.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
