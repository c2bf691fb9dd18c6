//! SQLite-backed store for items, classifications and collection runs.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`insert_item`](Store::insert_item) | Idempotent insert keyed by external id |
//! | [`insert_classification`](Store::insert_classification) | Insert-once classification + flag flip in one transaction |
//! | [`list_unclassified`](Store::list_unclassified) | Work queue for the classifier, highest score first |
//! | [`query_classified`](Store::query_classified) | Filtered, sorted, paginated read with a total count |
//! | [`get_by_id`](Store::get_by_id) | One classified item including the raw model response |
//! | [`aggregate_stats`](Store::aggregate_stats) | Totals and per-category / per-subreddit counts |
//! | [`list_trending`](Store::list_trending) | Fixed weighted ranking |
//!
//! List-valued classification fields are stored as JSON text; see
//! [`encode_list`] and [`decode_list`].

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::error::StoreError;
use crate::migrate;
use crate::models::{
    CategoryCount, Classification, ClassifiedItem, Item, ItemKind, NewItem, RunRecord, Stats,
    SubredditCount,
};

/// Sort keys accepted by [`Store::query_classified`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    OpportunityScore,
    Score,
    NumComments,
    Severity,
    CreatedUtc,
}

impl SortKey {
    /// Unknown keys fall back to [`SortKey::OpportunityScore`].
    pub fn parse(s: &str) -> Self {
        match s {
            "score" => SortKey::Score,
            "num_comments" => SortKey::NumComments,
            "severity" => SortKey::Severity,
            "created_utc" => SortKey::CreatedUtc,
            _ => SortKey::OpportunityScore,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            SortKey::OpportunityScore => "c.opportunity_score",
            SortKey::Score => "i.score",
            SortKey::NumComments => "i.num_comments",
            SortKey::Severity => "c.severity",
            SortKey::CreatedUtc => "i.created_utc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

impl SortOrder {
    /// Anything other than `asc` (case-insensitive) is descending.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filters, sort and page for [`Store::query_classified`].
#[derive(Debug, Clone)]
pub struct PainPointQuery {
    pub subreddit: Option<String>,
    pub category: Option<String>,
    pub min_score: Option<i64>,
    /// Substring match over title, body and summary.
    pub search: Option<String>,
    pub sort_by: SortKey,
    pub order: SortOrder,
    pub limit: i64,
    pub offset: i64,
}

impl Default for PainPointQuery {
    fn default() -> Self {
        Self {
            subreddit: None,
            category: None,
            min_score: None,
            search: None,
            sort_by: SortKey::default(),
            order: SortOrder::default(),
            limit: 50,
            offset: 0,
        }
    }
}

const CLASSIFIED_COLUMNS: &str = "i.id, i.external_id, i.subreddit, i.title, i.body, i.author, \
     i.url, i.score, i.num_comments, i.created_utc, i.kind, i.parent_external_id, \
     i.collected_at, i.classified, c.pain_point_summary, c.category, c.severity, \
     c.affected_audience, c.potential_solutions, c.market_size_tier, c.market_size_estimate, \
     c.existing_solutions, c.opportunity_score, c.classified_at, c.raw_llm_response";

const ITEM_COLUMNS: &str = "i.id, i.external_id, i.subreddit, i.title, i.body, i.author, \
     i.url, i.score, i.num_comments, i.created_utc, i.kind, i.parent_external_id, \
     i.collected_at, i.classified";

/// Serialize a list-valued field for storage.
pub fn encode_list(values: &[String]) -> Result<String, serde_json::Error> {
    serde_json::to_string(values)
}

/// Decode a stored list. Malformed or non-array text yields an empty list.
pub fn decode_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Handle to the SQLite database. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect using the configured path and apply the schema.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ============ Items ============

    /// Insert an item unless its external id is already stored.
    ///
    /// Returns the internal id, which for a repeat insert is the id of the
    /// row created the first time.
    pub async fn insert_item(&self, item: &NewItem) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO items (id, external_id, subreddit, title, body, author, url, score,
                               num_comments, created_utc, kind, parent_external_id, collected_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(external_id) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(&item.external_id)
        .bind(&item.subreddit)
        .bind(&item.title)
        .bind(&item.body)
        .bind(&item.author)
        .bind(&item.url)
        .bind(item.score)
        .bind(item.num_comments)
        .bind(item.created_utc)
        .bind(item.kind.as_str())
        .bind(&item.parent_external_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let existing: String = sqlx::query_scalar("SELECT id FROM items WHERE external_id = ?")
            .bind(&item.external_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(existing)
    }

    pub async fn get_item(&self, id: &str) -> Result<Option<Item>> {
        let row = sqlx::query(&format!("SELECT {} FROM items i WHERE i.id = ?", ITEM_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(item_from_row))
    }

    pub async fn count_items(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    pub async fn count_unclassified(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE classified = 0")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Up to `limit` unclassified items, most popular first.
    pub async fn list_unclassified(&self, limit: i64) -> Result<Vec<Item>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM items i WHERE i.classified = 0 \
             ORDER BY i.score DESC, i.collected_at ASC LIMIT ?",
            ITEM_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(item_from_row).collect())
    }

    // ============ Classifications ============

    /// Commit a classification and flip the item's flag atomically.
    ///
    /// Rejects a second classification for the same item with
    /// [`StoreError::AlreadyClassified`]; on any error nothing is written.
    pub async fn insert_classification(
        &self,
        item_id: &str,
        classification: &Classification,
    ) -> Result<String, StoreError> {
        let potential = encode_list(&classification.potential_solutions)?;
        let existing = encode_list(&classification.existing_solutions)?;
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;

        let classified: Option<bool> =
            sqlx::query_scalar("SELECT classified FROM items WHERE id = ?")
                .bind(item_id)
                .fetch_optional(&mut *tx)
                .await?;
        match classified {
            None => return Err(StoreError::ItemNotFound(item_id.to_string())),
            Some(true) => return Err(StoreError::AlreadyClassified(item_id.to_string())),
            Some(false) => {}
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO classifications (id, item_id, pain_point_summary, category, severity,
                                         affected_audience, potential_solutions, market_size_tier,
                                         market_size_estimate, existing_solutions,
                                         opportunity_score, raw_llm_response, classified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(item_id)
        .bind(&classification.pain_point_summary)
        .bind(classification.category.label())
        .bind(classification.severity)
        .bind(&classification.affected_audience)
        .bind(&potential)
        .bind(classification.market_size.tier.as_str())
        .bind(&classification.market_size.estimate)
        .bind(&existing)
        .bind(classification.opportunity_score)
        .bind(&classification.raw_llm_response)
        .bind(now)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            return Err(match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    StoreError::AlreadyClassified(item_id.to_string())
                }
                other => StoreError::Database(other),
            });
        }

        let flipped = sqlx::query("UPDATE items SET classified = 1 WHERE id = ? AND classified = 0")
            .bind(item_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if flipped != 1 {
            return Err(StoreError::AlreadyClassified(item_id.to_string()));
        }

        tx.commit().await?;
        Ok(id)
    }

    /// Classified items matching `query`, plus the total match count
    /// ignoring limit and offset.
    pub async fn query_classified(
        &self,
        query: &PainPointQuery,
    ) -> Result<(Vec<ClassifiedItem>, i64)> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM items i JOIN classifications c ON c.item_id = i.id WHERE 1=1",
            CLASSIFIED_COLUMNS
        ));
        push_filters(&mut qb, query);
        qb.push(format!(
            " ORDER BY {} {}, i.id ASC LIMIT ",
            query.sort_by.column(),
            query.order.sql()
        ));
        qb.push_bind(query.limit);
        qb.push(" OFFSET ");
        qb.push_bind(query.offset);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let items = rows.iter().map(|r| classified_from_row(r, false)).collect();

        let mut count_qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*) FROM items i JOIN classifications c ON c.item_id = i.id WHERE 1=1",
        );
        push_filters(&mut count_qb, query);
        let total: i64 = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok((items, total))
    }

    /// A classified item by internal id, including the raw model response.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<ClassifiedItem>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM items i JOIN classifications c ON c.item_id = i.id WHERE i.id = ?",
            CLASSIFIED_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(|r| classified_from_row(r, true)))
    }

    /// Ranked by `score * 2 + num_comments * 3 + opportunity_score`.
    pub async fn list_trending(&self, limit: i64) -> Result<Vec<ClassifiedItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM items i JOIN classifications c ON c.item_id = i.id \
             ORDER BY (i.score * 2 + i.num_comments * 3 + c.opportunity_score) DESC, i.id ASC \
             LIMIT ?",
            CLASSIFIED_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| classified_from_row(r, false)).collect())
    }

    pub async fn aggregate_stats(&self) -> Result<Stats> {
        let total_items = self.count_items().await?;
        let classified_items: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE classified = 1")
                .fetch_one(&self.pool)
                .await?;

        let categories = sqlx::query(
            "SELECT category, COUNT(*) AS cnt FROM classifications \
             GROUP BY category ORDER BY cnt DESC, category ASC",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| CategoryCount {
            category: row.get("category"),
            count: row.get("cnt"),
        })
        .collect();

        let subreddits = sqlx::query(
            "SELECT subreddit, COUNT(*) AS cnt FROM items WHERE classified = 1 \
             GROUP BY subreddit ORDER BY cnt DESC, subreddit ASC",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| SubredditCount {
            subreddit: row.get("subreddit"),
            count: row.get("cnt"),
        })
        .collect();

        let avg: Option<f64> =
            sqlx::query_scalar("SELECT AVG(opportunity_score) FROM classifications")
                .fetch_one(&self.pool)
                .await?;
        let top: Option<i64> =
            sqlx::query_scalar("SELECT MAX(opportunity_score) FROM classifications")
                .fetch_one(&self.pool)
                .await?;

        Ok(Stats {
            total_items,
            classified_items,
            categories,
            subreddits,
            avg_opportunity_score: avg.map(|a| (a * 10.0).round() / 10.0).unwrap_or(0.0),
            top_opportunity_score: top.unwrap_or(0),
        })
    }

    // ============ Collection runs ============

    pub async fn begin_run(&self, subreddits: &[String]) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO collection_runs (id, started_at, subreddits, status) \
             VALUES (?, ?, ?, 'running')",
        )
        .bind(&id)
        .bind(chrono::Utc::now().timestamp())
        .bind(encode_list(subreddits)?)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn finish_run(
        &self,
        run_id: &str,
        found: i64,
        matched: i64,
        source_errors: i64,
        status: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE collection_runs SET finished_at = ?, items_found = ?, items_matched = ?, \
             source_errors = ?, status = ? WHERE id = ?",
        )
        .bind(chrono::Utc::now().timestamp())
        .bind(found)
        .bind(matched)
        .bind(source_errors)
        .bind(status)
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn recent_runs(&self, limit: i64) -> Result<Vec<RunRecord>> {
        let rows = sqlx::query(
            "SELECT id, started_at, finished_at, subreddits, items_found, items_matched, \
             source_errors, status FROM collection_runs ORDER BY started_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let subreddits: String = row.get("subreddits");
                RunRecord {
                    id: row.get("id"),
                    started_at: row.get("started_at"),
                    finished_at: row.get("finished_at"),
                    subreddits: decode_list(&subreddits),
                    items_found: row.get("items_found"),
                    items_matched: row.get("items_matched"),
                    source_errors: row.get("source_errors"),
                    status: row.get("status"),
                }
            })
            .collect())
    }
}

fn push_filters(qb: &mut QueryBuilder<Sqlite>, query: &PainPointQuery) {
    if let Some(ref subreddit) = query.subreddit {
        qb.push(" AND i.subreddit = ");
        qb.push_bind(subreddit.clone());
    }
    if let Some(ref category) = query.category {
        qb.push(" AND c.category = ");
        qb.push_bind(category.clone());
    }
    if let Some(min) = query.min_score {
        qb.push(" AND c.opportunity_score >= ");
        qb.push_bind(min);
    }
    if let Some(ref search) = query.search {
        let pattern = format!("%{}%", search);
        qb.push(" AND (i.title LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR i.body LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR c.pain_point_summary LIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
}

fn item_from_row(row: &SqliteRow) -> Item {
    let kind: String = row.get("kind");
    Item {
        id: row.get("id"),
        external_id: row.get("external_id"),
        subreddit: row.get("subreddit"),
        title: row.get("title"),
        body: row.get("body"),
        author: row.get("author"),
        url: row.get("url"),
        score: row.get("score"),
        num_comments: row.get("num_comments"),
        created_utc: row.get("created_utc"),
        kind: ItemKind::parse(&kind),
        parent_external_id: row.get("parent_external_id"),
        collected_at: row.get("collected_at"),
        classified: row.get("classified"),
    }
}

fn classified_from_row(row: &SqliteRow, with_raw: bool) -> ClassifiedItem {
    let potential: String = row.get("potential_solutions");
    let existing: String = row.get("existing_solutions");
    ClassifiedItem {
        item: item_from_row(row),
        pain_point_summary: row.get("pain_point_summary"),
        category: row.get("category"),
        severity: row.get("severity"),
        affected_audience: row.get("affected_audience"),
        potential_solutions: decode_list(&potential),
        market_size_tier: row.get("market_size_tier"),
        market_size_estimate: row.get("market_size_estimate"),
        existing_solutions: decode_list(&existing),
        opportunity_score: row.get("opportunity_score"),
        classified_at: row.get("classified_at"),
        raw_llm_response: if with_raw {
            Some(row.get("raw_llm_response"))
        } else {
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, MarketSize};
    use tempfile::TempDir;

    async fn temp_store() -> (TempDir, Store) {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect_path(&tmp.path().join("test.sqlite"))
            .await
            .unwrap();
        migrate::apply_schema(&pool).await.unwrap();
        (tmp, Store::new(pool))
    }

    fn new_item(external_id: &str, subreddit: &str, score: i64) -> NewItem {
        NewItem {
            external_id: external_id.to_string(),
            subreddit: subreddit.to_string(),
            title: format!("title {}", external_id),
            body: "I wish this existed".to_string(),
            author: "someone".to_string(),
            url: format!("https://reddit.com/r/{}/comments/{}", subreddit, external_id),
            score,
            num_comments: 3,
            created_utc: 1_700_000_000,
            kind: ItemKind::Submission,
            parent_external_id: None,
        }
    }

    fn classification(category: Category, score: i64) -> Classification {
        Classification {
            pain_point_summary: "People cannot find a simple invoicing tool".to_string(),
            category,
            severity: 4,
            affected_audience: "freelancers".to_string(),
            potential_solutions: vec!["a tool".to_string(), "a plugin".to_string()],
            market_size: MarketSize::from_estimate("Medium - lots of freelancers"),
            existing_solutions: vec!["FreshBooks".to_string()],
            opportunity_score: score,
            raw_llm_response: "{}".to_string(),
        }
    }

    async fn classification_rows(store: &Store, item_id: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM classifications WHERE item_id = ?")
            .bind(item_id)
            .fetch_one(store.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn insert_item_is_idempotent() {
        let (_tmp, store) = temp_store().await;
        let first = store.insert_item(&new_item("t3_abc", "SaaS", 10)).await.unwrap();
        let second = store.insert_item(&new_item("t3_abc", "SaaS", 99)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.count_items().await.unwrap(), 1);

        // The first insert wins; a repeat does not overwrite
        let item = store.get_item(&first).await.unwrap().unwrap();
        assert_eq!(item.score, 10);
    }

    #[tokio::test]
    async fn submission_and_comment_ids_do_not_collide() {
        let (_tmp, store) = temp_store().await;
        store.insert_item(&new_item("t3_abc", "SaaS", 1)).await.unwrap();
        let mut comment = new_item("t1_abc", "SaaS", 1);
        comment.kind = ItemKind::Comment;
        comment.parent_external_id = Some("t3_abc".to_string());
        store.insert_item(&comment).await.unwrap();
        assert_eq!(store.count_items().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn classification_flips_flag_atomically() {
        let (_tmp, store) = temp_store().await;
        let id = store.insert_item(&new_item("t3_a", "SaaS", 1)).await.unwrap();

        assert!(!store.get_item(&id).await.unwrap().unwrap().classified);
        assert_eq!(classification_rows(&store, &id).await, 0);

        store
            .insert_classification(&id, &classification(Category::Finance, 70))
            .await
            .unwrap();

        assert!(store.get_item(&id).await.unwrap().unwrap().classified);
        assert_eq!(classification_rows(&store, &id).await, 1);
        assert_eq!(store.count_unclassified().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn double_classification_is_rejected() {
        let (_tmp, store) = temp_store().await;
        let id = store.insert_item(&new_item("t3_a", "SaaS", 1)).await.unwrap();
        store
            .insert_classification(&id, &classification(Category::Finance, 70))
            .await
            .unwrap();

        let err = store
            .insert_classification(&id, &classification(Category::Design, 20))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyClassified(_)));
        assert_eq!(classification_rows(&store, &id).await, 1);

        let stored = store.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.category, "Finance");
    }

    #[tokio::test]
    async fn classifying_unknown_item_fails_without_writing() {
        let (_tmp, store) = temp_store().await;
        let err = store
            .insert_classification("missing", &classification(Category::Other, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ItemNotFound(_)));
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM classifications")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn unclassified_ordered_by_score() {
        let (_tmp, store) = temp_store().await;
        store.insert_item(&new_item("t3_low", "SaaS", 1)).await.unwrap();
        store.insert_item(&new_item("t3_high", "SaaS", 500)).await.unwrap();
        store.insert_item(&new_item("t3_mid", "SaaS", 50)).await.unwrap();

        let items = store.list_unclassified(2).await.unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.external_id.as_str()).collect();
        assert_eq!(ids, vec!["t3_high", "t3_mid"]);
    }

    #[tokio::test]
    async fn query_filters_and_total() {
        let (_tmp, store) = temp_store().await;
        for (ext, sub, cat, score) in [
            ("t3_1", "SaaS", Category::Productivity, 80),
            ("t3_2", "SaaS", Category::Productivity, 40),
            ("t3_3", "webdev", Category::DeveloperTools, 90),
        ] {
            let id = store.insert_item(&new_item(ext, sub, 5)).await.unwrap();
            store
                .insert_classification(&id, &classification(cat, score))
                .await
                .unwrap();
        }

        let (rows, total) = store
            .query_classified(&PainPointQuery {
                category: Some("Productivity".to_string()),
                min_score: Some(50),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].item.external_id, "t3_1");

        let (rows, total) = store
            .query_classified(&PainPointQuery {
                subreddit: Some("SaaS".to_string()),
                limit: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(total, 2);

        let (_, total) = store
            .query_classified(&PainPointQuery {
                search: Some("t3_3".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn unknown_sort_key_falls_back_to_opportunity_score() {
        let (_tmp, store) = temp_store().await;
        for (ext, score) in [("t3_1", 10), ("t3_2", 90), ("t3_3", 50)] {
            let id = store.insert_item(&new_item(ext, "SaaS", 1)).await.unwrap();
            store
                .insert_classification(&id, &classification(Category::Other, score))
                .await
                .unwrap();
        }

        let query = PainPointQuery {
            sort_by: SortKey::parse("id; DROP TABLE items"),
            order: SortOrder::parse("sideways"),
            ..Default::default()
        };
        assert_eq!(query.sort_by, SortKey::OpportunityScore);
        let (rows, _) = store.query_classified(&query).await.unwrap();
        let scores: Vec<i64> = rows.iter().map(|r| r.opportunity_score).collect();
        assert_eq!(scores, vec![90, 50, 10]);
    }

    #[tokio::test]
    async fn trending_weights_engagement() {
        let (_tmp, store) = temp_store().await;
        let mut quiet = new_item("t3_quiet", "SaaS", 1);
        quiet.num_comments = 0;
        let mut busy = new_item("t3_busy", "SaaS", 100);
        busy.num_comments = 40;
        for (item, score) in [(quiet, 95), (busy, 30)] {
            let id = store.insert_item(&item).await.unwrap();
            store
                .insert_classification(&id, &classification(Category::Other, score))
                .await
                .unwrap();
        }

        let rows = store.list_trending(10).await.unwrap();
        assert_eq!(rows[0].item.external_id, "t3_busy");
    }

    #[tokio::test]
    async fn stats_aggregate() {
        let (_tmp, store) = temp_store().await;
        let a = store.insert_item(&new_item("t3_a", "SaaS", 1)).await.unwrap();
        let b = store.insert_item(&new_item("t3_b", "webdev", 1)).await.unwrap();
        store.insert_item(&new_item("t3_c", "webdev", 1)).await.unwrap();
        store
            .insert_classification(&a, &classification(Category::Finance, 80))
            .await
            .unwrap();
        store
            .insert_classification(&b, &classification(Category::Finance, 45))
            .await
            .unwrap();

        let stats = store.aggregate_stats().await.unwrap();
        assert_eq!(stats.total_items, 3);
        assert_eq!(stats.classified_items, 2);
        assert_eq!(stats.categories.len(), 1);
        assert_eq!(stats.categories[0].count, 2);
        assert_eq!(stats.subreddits.len(), 2);
        assert_eq!(stats.avg_opportunity_score, 62.5);
        assert_eq!(stats.top_opportunity_score, 80);
    }

    #[tokio::test]
    async fn empty_stats_are_zero() {
        let (_tmp, store) = temp_store().await;
        let stats = store.aggregate_stats().await.unwrap();
        assert_eq!(stats.total_items, 0);
        assert_eq!(stats.avg_opportunity_score, 0.0);
        assert_eq!(stats.top_opportunity_score, 0);
    }

    #[tokio::test]
    async fn corrupt_list_column_reads_as_empty() {
        let (_tmp, store) = temp_store().await;
        let id = store.insert_item(&new_item("t3_a", "SaaS", 1)).await.unwrap();
        store
            .insert_classification(&id, &classification(Category::Other, 5))
            .await
            .unwrap();
        sqlx::query("UPDATE classifications SET potential_solutions = 'not json' WHERE item_id = ?")
            .bind(&id)
            .execute(store.pool())
            .await
            .unwrap();

        let row = store.get_by_id(&id).await.unwrap().unwrap();
        assert!(row.potential_solutions.is_empty());
        assert_eq!(row.existing_solutions, vec!["FreshBooks"]);
        assert_eq!(row.raw_llm_response.as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn run_records_round_trip() {
        let (_tmp, store) = temp_store().await;
        let run = store
            .begin_run(&["SaaS".to_string(), "webdev".to_string()])
            .await
            .unwrap();
        store.finish_run(&run, 12, 3, 1, "completed").await.unwrap();

        let runs = store.recent_runs(5).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].subreddits, vec!["SaaS", "webdev"]);
        assert_eq!(runs[0].items_matched, 3);
        assert_eq!(runs[0].status, "completed");
        assert!(runs[0].finished_at.is_some());
    }

    #[test]
    fn decode_list_tolerates_garbage() {
        assert_eq!(decode_list(r#"["a","b"]"#), vec!["a", "b"]);
        assert!(decode_list("").is_empty());
        assert!(decode_list("{\"a\":1}").is_empty());
    }
}
