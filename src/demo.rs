//! Sample data for exploring the API without credentials.
//!
//! `pph demo` inserts a handful of classified submissions. External ids
//! use the `t3_demo_NNN` namespace, so loading twice changes nothing.

use anyhow::Result;

use crate::config::Config;
use crate::models::{Category, Classification, ItemKind, MarketSize, NewItem};
use crate::store::Store;

struct Sample {
    external_id: &'static str,
    subreddit: &'static str,
    title: &'static str,
    body: &'static str,
    author: &'static str,
    score: i64,
    num_comments: i64,
    age_hours: i64,
    summary: &'static str,
    category: Category,
    severity: i64,
    audience: &'static str,
    solutions: &'static [&'static str],
    market: &'static str,
    existing: &'static [&'static str],
    opportunity: i64,
}

const SAMPLES: &[Sample] = &[
    Sample {
        external_id: "t3_demo_001",
        subreddit: "SaaS",
        title: "I wish there was a simple way to track feature requests from multiple channels",
        body: "Requests arrive by email, Slack, support tickets and Twitter. Canny and Productboard are either too expensive or too heavy for a team of four. I just want one list that shows what is most requested. Would pay $20-50/mo.",
        author: "startup_founder_42",
        score: 187,
        num_comments: 43,
        age_hours: 48,
        summary: "Small teams lack an affordable way to aggregate feature requests from several channels",
        category: Category::Productivity,
        severity: 4,
        audience: "Small SaaS founders and product managers",
        solutions: &[
            "Lightweight request aggregator with email and Slack intake",
            "Automatic deduplication and ranking of requests",
        ],
        market: "Large - every SaaS company collects feature requests and current tools are overbuilt",
        existing: &["Canny", "Productboard", "Nolt"],
        opportunity: 82,
    },
    Sample {
        external_id: "t3_demo_002",
        subreddit: "webdev",
        title: "Frustrated with managing environment variables across 12 microservices",
        body: "Keeping .env files in sync across our services is a nightmare. Somebody always forgets one service when a variable is added. Vault is overkill for five people.",
        author: "devops_pain",
        score: 234,
        num_comments: 67,
        age_hours: 24,
        summary: "Keeping environment variables in sync across many services is error-prone for small teams",
        category: Category::DeveloperTools,
        severity: 5,
        audience: "Small development teams running several services",
        solutions: &[
            "Env manager with inheritance and per-service overrides",
            "Pre-deploy check that every service has its required variables",
        ],
        market: "Large - most teams with more than one service hit this",
        existing: &["HashiCorp Vault", "Doppler", "AWS Parameter Store"],
        opportunity: 88,
    },
    Sample {
        external_id: "t3_demo_003",
        subreddit: "Entrepreneur",
        title: "Why isn't there a simple tool to track competitor pricing changes?",
        body: "I check ten competitor pricing pages by hand every week. It is a waste of time. I want an alert when one of them changes.",
        author: "competitive_intel",
        score: 156,
        num_comments: 38,
        age_hours: 72,
        summary: "No simple way to get alerted when competitor pricing pages change",
        category: Category::Business,
        severity: 3,
        audience: "SaaS founders and product marketers",
        solutions: &["Pricing page monitor with change alerts"],
        market: "Medium - niche but willing to pay",
        existing: &["Visualping", "Kompyte"],
        opportunity: 71,
    },
    Sample {
        external_id: "t3_demo_004",
        subreddit: "startups",
        title: "Tired of manually creating investor update emails every month",
        body: "Every month I spend hours pulling numbers from Stripe and analytics into an email for fifteen investors. I'd pay for something that drafts it from my data.",
        author: "series_a_ceo",
        score: 312,
        num_comments: 89,
        age_hours: 36,
        summary: "Monthly investor updates take hours of manual data gathering and formatting",
        category: Category::Business,
        severity: 4,
        audience: "Funded startup founders",
        solutions: &[
            "Investor updates generated from Stripe and analytics data",
            "Template-driven update builder with metric snapshots",
        ],
        market: "Medium - tens of thousands of funded startups",
        existing: &["Visible.vc", "Cabal"],
        opportunity: 79,
    },
    Sample {
        external_id: "t3_demo_005",
        subreddit: "selfhosted",
        title: "Can't find a good self-hosted alternative to Calendly",
        body: "Cal.com is too complex to self-host and the other options look ancient. I want a clean scheduler with timezone handling and Google Calendar sync on my own server.",
        author: "privacy_first_dev",
        score: 145,
        num_comments: 52,
        age_hours: 96,
        summary: "Self-hosters lack a simple, modern scheduling tool",
        category: Category::Productivity,
        severity: 3,
        audience: "Privacy-focused professionals running their own servers",
        solutions: &["Single-binary scheduler with calendar sync"],
        market: "Large - the self-hosted community is growing and scheduling is universal",
        existing: &["Cal.com", "Easy!Appointments"],
        opportunity: 68,
    },
    Sample {
        external_id: "t3_demo_006",
        subreddit: "smallbusiness",
        title: "Collecting customer testimonials is so annoying",
        body: "Asking customers for a review, chasing them, then copying quotes onto the website takes forever. The tools that do this cost more than my hosting.",
        author: "bakery_owner",
        score: 98,
        num_comments: 31,
        age_hours: 120,
        summary: "Gathering and publishing customer testimonials is manual and existing tools are overpriced",
        category: Category::Marketing,
        severity: 3,
        audience: "Small business owners",
        solutions: &["Cheap testimonial request and embed widget"],
        market: "Large - every business wants social proof",
        existing: &["Testimonial.to", "Senja"],
        opportunity: 64,
    },
];

/// Insert the samples. Returns how many were newly classified.
pub async fn load_demo(store: &Store) -> Result<usize> {
    let now = chrono::Utc::now().timestamp();
    let mut loaded = 0;

    for s in SAMPLES {
        let id = store
            .insert_item(&NewItem {
                external_id: s.external_id.to_string(),
                subreddit: s.subreddit.to_string(),
                title: s.title.to_string(),
                body: s.body.to_string(),
                author: s.author.to_string(),
                url: format!(
                    "https://reddit.com/r/{}/comments/{}",
                    s.subreddit,
                    s.external_id.trim_start_matches("t3_")
                ),
                score: s.score,
                num_comments: s.num_comments,
                created_utc: now - s.age_hours * 3600,
                kind: ItemKind::Submission,
                parent_external_id: None,
            })
            .await?;

        let already = store
            .get_item(&id)
            .await?
            .map(|item| item.classified)
            .unwrap_or(false);
        if already {
            continue;
        }

        let classification = Classification {
            pain_point_summary: s.summary.to_string(),
            category: s.category,
            severity: s.severity,
            affected_audience: s.audience.to_string(),
            potential_solutions: s.solutions.iter().map(|v| v.to_string()).collect(),
            market_size: MarketSize::from_estimate(s.market),
            existing_solutions: s.existing.iter().map(|v| v.to_string()).collect(),
            opportunity_score: s.opportunity,
            raw_llm_response: String::new(),
        };
        store.insert_classification(&id, &classification).await?;
        loaded += 1;
    }

    Ok(loaded)
}

/// CLI entry point for `pph demo`.
pub async fn run_demo(config: &Config) -> Result<()> {
    let store = Store::open(config).await?;
    let loaded = load_demo(&store).await?;
    store.close().await;

    println!(
        "Demo data: {} sample pain points loaded ({} total).",
        loaded,
        SAMPLES.len()
    );
    println!("Run `pph serve` and open http://{}/api/pain-points", config.server.bind);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::migrate;
    use tempfile::TempDir;

    #[tokio::test]
    async fn demo_load_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let pool = db::connect_path(&dir.path().join("test.sqlite"))
            .await
            .unwrap();
        migrate::apply_schema(&pool).await.unwrap();
        let store = Store::new(pool);

        assert_eq!(load_demo(&store).await.unwrap(), SAMPLES.len());
        assert_eq!(load_demo(&store).await.unwrap(), 0);

        let stats = store.aggregate_stats().await.unwrap();
        assert_eq!(stats.total_items, SAMPLES.len() as i64);
        assert_eq!(stats.classified_items, SAMPLES.len() as i64);
        assert_eq!(stats.top_opportunity_score, 88);
    }
}
