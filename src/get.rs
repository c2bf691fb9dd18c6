//! Pain point retrieval for the CLI.
//!
//! `pph get <id>` prints one classified item in full, and `pph trending`
//! prints the weighted ranking served by `GET /api/trending`.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::models::ClassifiedItem;
use crate::store::Store;

/// CLI entry point for `pph get`.
pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let store = Store::open(config).await?;
    let item = store.get_by_id(id).await?;
    store.close().await;

    let Some(item) = item else {
        bail!("pain point not found: {}", id);
    };

    let i = &item.item;
    println!("--- Pain Point ---");
    println!("id:          {}", i.id);
    println!("external_id: {}", i.external_id);
    println!("kind:        {}", i.kind.as_str());
    println!("subreddit:   r/{}", i.subreddit);
    println!("title:       {}", i.title);
    println!("author:      {}", i.author);
    println!("url:         {}", i.url);
    println!("score:       {} ({} comments)", i.score, i.num_comments);
    if let Some(ref parent) = i.parent_external_id {
        println!("parent:      {}", parent);
    }
    println!("created_at:  {}", format_ts_iso(i.created_utc));
    println!();

    println!("--- Analysis ---");
    println!("summary:     {}", item.pain_point_summary);
    println!("category:    {}", item.category);
    println!("severity:    {}/5", item.severity);
    println!("audience:    {}", item.affected_audience);
    println!("market:      {}", item.market_size_estimate);
    println!("opportunity: {}/100", item.opportunity_score);
    print_list("solutions:", &item.potential_solutions);
    print_list("existing:", &item.existing_solutions);
    println!();

    println!("--- Body ---");
    println!("{}", i.body);
    println!();

    if let Some(ref raw) = item.raw_llm_response {
        println!("--- Raw Response ---");
        println!("{}", raw);
    }

    Ok(())
}

/// CLI entry point for `pph trending`.
pub async fn run_trending(config: &Config, limit: i64) -> Result<()> {
    let store = Store::open(config).await?;
    let items = store.list_trending(limit).await?;
    store.close().await;

    if items.is_empty() {
        println!("No classified items yet.");
        return Ok(());
    }

    for (rank, item) in items.iter().enumerate() {
        print_summary_line(rank + 1, item);
    }
    Ok(())
}

fn print_summary_line(rank: usize, item: &ClassifiedItem) {
    println!(
        "{}. [{:>3}] r/{} ({}, severity {}) {}",
        rank,
        item.opportunity_score,
        item.item.subreddit,
        item.category,
        item.severity,
        item.pain_point_summary
    );
    println!("    id: {}  score: {}  comments: {}", item.item.id, item.item.score, item.item.num_comments);
}

fn print_list(label: &str, values: &[String]) {
    if values.is_empty() {
        println!("{:<12} (none)", label);
        return;
    }
    println!("{}", label);
    for v in values {
        println!("  - {}", v);
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
