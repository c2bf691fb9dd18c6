//! Export classified items as JSON or CSV.
//!
//! Shared by `pph export` and `GET /api/export`. JSON output is
//! `{"items": [...], "count": N}`; CSV has one row per item with the list
//! fields embedded as JSON text.

use anyhow::{bail, Result};
use serde::Serialize;
use std::path::Path;

use crate::config::Config;
use crate::models::ClassifiedItem;
use crate::store::{encode_list, PainPointQuery, Store};

/// Upper bound on exported rows.
pub const EXPORT_LIMIT: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => bail!("Unknown export format: '{}'. Must be json or csv.", other),
        }
    }
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    items: &'a [ClassifiedItem],
    count: usize,
}

const CSV_COLUMNS: &[&str] = &[
    "id",
    "external_id",
    "kind",
    "subreddit",
    "title",
    "body",
    "author",
    "url",
    "score",
    "num_comments",
    "created_utc",
    "parent_external_id",
    "pain_point_summary",
    "category",
    "severity",
    "affected_audience",
    "potential_solutions",
    "market_size_tier",
    "market_size_estimate",
    "existing_solutions",
    "opportunity_score",
    "classified_at",
];

/// All classified items, best opportunities first.
pub async fn load_items(store: &Store) -> Result<Vec<ClassifiedItem>> {
    let query = PainPointQuery {
        limit: EXPORT_LIMIT,
        ..PainPointQuery::default()
    };
    let (items, _) = store.query_classified(&query).await?;
    Ok(items)
}

pub fn to_json(items: &[ClassifiedItem]) -> Result<String> {
    Ok(serde_json::to_string_pretty(&ExportDocument {
        items,
        count: items.len(),
    })?)
}

pub fn to_csv(items: &[ClassifiedItem]) -> Result<String> {
    let mut out = String::new();
    out.push_str(&CSV_COLUMNS.join(","));
    out.push_str("\r\n");

    for c in items {
        let i = &c.item;
        let fields: Vec<String> = vec![
            i.id.clone(),
            i.external_id.clone(),
            i.kind.as_str().to_string(),
            i.subreddit.clone(),
            i.title.clone(),
            i.body.clone(),
            i.author.clone(),
            i.url.clone(),
            i.score.to_string(),
            i.num_comments.to_string(),
            i.created_utc.to_string(),
            i.parent_external_id.clone().unwrap_or_default(),
            c.pain_point_summary.clone(),
            c.category.clone(),
            c.severity.to_string(),
            c.affected_audience.clone(),
            encode_list(&c.potential_solutions)?,
            c.market_size_tier.clone(),
            c.market_size_estimate.clone(),
            encode_list(&c.existing_solutions)?,
            c.opportunity_score.to_string(),
            c.classified_at.to_string(),
        ];
        let row: Vec<String> = fields.iter().map(|f| csv_escape(f)).collect();
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }

    Ok(out)
}

/// Quote a field when it contains a delimiter, quote, or line break.
pub fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn render(items: &[ClassifiedItem], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => to_json(items),
        ExportFormat::Csv => to_csv(items),
    }
}

/// Export classified items.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub async fn run_export(config: &Config, format: &str, output: Option<&Path>) -> Result<()> {
    let format = ExportFormat::parse(format)?;
    let store = Store::open(config).await?;
    let items = load_items(&store).await?;
    let rendered = render(&items, format)?;

    if let Some(path) = output {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, &rendered)?;
        eprintln!("Exported {} items to {}", items.len(), path.display());
    } else {
        print!("{}", rendered);
    }

    store.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, ItemKind};

    fn classified() -> ClassifiedItem {
        ClassifiedItem {
            item: Item {
                id: "id-1".to_string(),
                external_id: "t3_abc".to_string(),
                subreddit: "SaaS".to_string(),
                title: "Invoices, again".to_string(),
                body: "He said \"never\"\nthen left".to_string(),
                author: "founder".to_string(),
                url: "https://reddit.com/r/SaaS/comments/abc/".to_string(),
                score: 42,
                num_comments: 7,
                created_utc: 1_700_000_000,
                kind: ItemKind::Submission,
                parent_external_id: None,
                collected_at: 1_700_000_100,
                classified: true,
            },
            pain_point_summary: "Invoicing is slow".to_string(),
            category: "Finance".to_string(),
            severity: 4,
            affected_audience: "Freelancers".to_string(),
            potential_solutions: vec!["One-click invoices".to_string()],
            market_size_tier: "Large".to_string(),
            market_size_estimate: "Large - everyone invoices".to_string(),
            existing_solutions: vec![],
            opportunity_score: 72,
            classified_at: 1_700_000_200,
            raw_llm_response: None,
        }
    }

    #[test]
    fn escapes_only_when_needed() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn csv_has_header_and_embedded_lists() {
        let csv = to_csv(&[classified()]).unwrap();
        let mut lines = csv.split("\r\n");
        let header = lines.next().unwrap();
        assert!(header.starts_with("id,external_id,kind,subreddit"));
        assert_eq!(header.split(',').count(), CSV_COLUMNS.len());

        assert!(csv.contains("\"Invoices, again\""));
        assert!(csv.contains("\"He said \"\"never\"\"\nthen left\""));
        assert!(csv.contains("\"[\"\"One-click invoices\"\"]\""));
        assert!(csv.contains(",[],"));
    }

    #[test]
    fn json_wraps_items_with_count() {
        let json = to_json(&[classified()]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(value["items"][0]["external_id"], "t3_abc");
        assert_eq!(value["items"][0]["potential_solutions"][0], "One-click invoices");
        assert!(value["items"][0].get("raw_llm_response").is_none());
    }

    #[test]
    fn format_parsing() {
        assert_eq!(ExportFormat::parse("CSV").unwrap(), ExportFormat::Csv);
        assert!(ExportFormat::parse("xml").is_err());
    }
}
