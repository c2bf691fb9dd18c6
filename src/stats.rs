//! Database statistics and collection history.
//!
//! `pph stats` summarises what has been collected and classified;
//! `pph runs` lists recent collection passes with their counts so a
//! quiet pass (nothing matched, many fetch errors) is easy to spot.

use anyhow::Result;

use crate::config::Config;
use crate::store::Store;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = Store::open(config).await?;
    let stats = store.aggregate_stats().await?;
    let pending = store.count_unclassified().await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Pain Point Harness: Database Stats");
    println!("===================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Items:       {}", stats.total_items);
    println!(
        "  Classified:  {} / {} ({}%)",
        stats.classified_items,
        stats.total_items,
        if stats.total_items > 0 {
            (stats.classified_items * 100) / stats.total_items
        } else {
            0
        }
    );
    println!("  Pending:     {}", pending);
    println!("  Avg score:   {:.1}", stats.avg_opportunity_score);
    println!("  Top score:   {}", stats.top_opportunity_score);

    if !stats.categories.is_empty() {
        println!();
        println!("  By category:");
        for c in &stats.categories {
            println!("    {:<24} {:>6}", c.category, c.count);
        }
    }

    if !stats.subreddits.is_empty() {
        println!();
        println!("  By subreddit:");
        for s in &stats.subreddits {
            println!("    {:<24} {:>6}", format!("r/{}", s.subreddit), s.count);
        }
    }

    println!();

    store.close().await;
    Ok(())
}

/// Print the most recent collection passes.
pub async fn run_runs(config: &Config, limit: i64) -> Result<()> {
    let store = Store::open(config).await?;
    let runs = store.recent_runs(limit).await?;

    if runs.is_empty() {
        println!("No collection runs yet.");
        store.close().await;
        return Ok(());
    }

    println!(
        "  {:<18} {:<10} {:>6} {:>8} {:>7}   {}",
        "STARTED", "STATUS", "FOUND", "MATCHED", "ERRORS", "SUBREDDITS"
    );
    println!("  {}", "-".repeat(76));

    for run in &runs {
        println!(
            "  {:<18} {:<10} {:>6} {:>8} {:>7}   {}",
            format_ts_relative(run.started_at),
            run.status,
            run.items_found,
            run.items_matched,
            run.source_errors,
            run.subreddits.join(",")
        );
    }

    store.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn relative_timestamps() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 120), "2 mins ago");
        assert_eq!(format_ts_relative(now - 86400), "1 day ago");
        assert_eq!(format_ts_relative(0), "1970-01-01 00:00");
    }
}
