//! HTTP query surface.
//!
//! Serves classified pain points to dashboards and scripts, and lets a
//! client trigger a background collect-and-classify pass.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/pain-points` | Filtered, sorted, paginated list |
//! | `GET`  | `/api/pain-points/{id}` | One item with its raw model response |
//! | `GET`  | `/api/stats` | Aggregate counts |
//! | `GET`  | `/api/categories` | Per-category counts |
//! | `GET`  | `/api/subreddits` | Per-subreddit classified counts |
//! | `GET`  | `/api/trending` | Weighted ranking |
//! | `GET`  | `/api/export` | JSON or CSV download |
//! | `POST` | `/api/scrape` | Start a background pass |
//! | `GET`  | `/api/scrape/status` | Run state and last result |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "pain point not found: 42" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::export::{self, ExportFormat};
use crate::pipeline::{Pipeline, RunState};
use crate::store::{PainPointQuery, SortKey, SortOrder, Store};

const MAX_PAGE: i64 = 200;
const MAX_TRENDING: i64 = 50;

#[derive(Clone)]
pub struct AppState {
    pipeline: Pipeline,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    fn store(&self) -> &Store {
        self.pipeline.store()
    }
}

/// Build the router with all routes and an open CORS policy.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/pain-points", get(handle_list))
        .route("/api/pain-points/{id}", get(handle_get))
        .route("/api/stats", get(handle_stats))
        .route("/api/categories", get(handle_categories))
        .route("/api/subreddits", get(handle_subreddits))
        .route("/api/trending", get(handle_trending))
        .route("/api/export", get(handle_export))
        .route("/api/scrape", post(handle_scrape))
        .route("/api/scrape/status", get(handle_scrape_status))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Open the store, build the pipeline, and serve until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = Store::open(config).await?;
    let pipeline = Pipeline::new(config.clone(), store);
    let app = router(AppState::new(pipeline));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = config.server.bind.as_str(), "server listening");
    println!("Listening on http://{}", config.server.bind);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "request failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /api/pain-points ============

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    subreddit: Option<String>,
    category: Option<String>,
    min_score: Option<i64>,
    sort_by: Option<String>,
    order: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
    search: Option<String>,
}

/// Empty query-string values are treated as absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ListParams {
    fn into_query(self) -> Result<PainPointQuery, AppError> {
        let limit = self.limit.unwrap_or(50);
        if !(1..=MAX_PAGE).contains(&limit) {
            return Err(bad_request(format!(
                "limit must be between 1 and {}",
                MAX_PAGE
            )));
        }
        let offset = self.offset.unwrap_or(0);
        if offset < 0 {
            return Err(bad_request("offset must not be negative"));
        }

        Ok(PainPointQuery {
            subreddit: non_empty(self.subreddit),
            category: non_empty(self.category),
            min_score: self.min_score,
            search: non_empty(self.search),
            sort_by: self
                .sort_by
                .as_deref()
                .map(SortKey::parse)
                .unwrap_or_default(),
            order: self
                .order
                .as_deref()
                .map(SortOrder::parse)
                .unwrap_or_default(),
            limit,
            offset,
        })
    }
}

async fn handle_list(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let Query(params) = params?;
    let query = params.into_query()?;
    let (items, total) = state.store().query_classified(&query).await?;
    Ok(Json(json!({
        "items": items,
        "total": total,
        "limit": query.limit,
        "offset": query.offset,
    })))
}

// ============ GET /api/pain-points/{id} ============

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let item = state
        .store()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| not_found(format!("pain point not found: {}", id)))?;
    Ok(Json(json!(item)))
}

// ============ Aggregates ============

async fn handle_stats(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let stats = state.store().aggregate_stats().await?;
    Ok(Json(json!(stats)))
}

async fn handle_categories(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let stats = state.store().aggregate_stats().await?;
    Ok(Json(json!({ "categories": stats.categories })))
}

async fn handle_subreddits(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let stats = state.store().aggregate_stats().await?;
    Ok(Json(json!({ "subreddits": stats.subreddits })))
}

// ============ GET /api/trending ============

#[derive(Debug, Default, Deserialize)]
pub struct TrendingParams {
    limit: Option<i64>,
}

async fn handle_trending(
    State(state): State<AppState>,
    params: Result<Query<TrendingParams>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let Query(params) = params?;
    let limit = params.limit.unwrap_or(10);
    if !(1..=MAX_TRENDING).contains(&limit) {
        return Err(bad_request(format!(
            "limit must be between 1 and {}",
            MAX_TRENDING
        )));
    }
    let items = state.store().list_trending(limit).await?;
    Ok(Json(json!({ "items": items })))
}

// ============ GET /api/export ============

#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
    format: Option<String>,
}

async fn handle_export(
    State(state): State<AppState>,
    params: Result<Query<ExportParams>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(params) = params?;
    let format = ExportFormat::parse(params.format.as_deref().unwrap_or("json"))
        .map_err(|e| bad_request(e.to_string()))?;
    let items = export::load_items(state.store()).await?;
    let body = export::render(&items, format)?;

    let response = match format {
        ExportFormat::Json => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        ExportFormat::Csv => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=pain_points.csv",
                ),
            ],
            body,
        )
            .into_response(),
    };
    Ok(response)
}

// ============ POST /api/scrape ============

async fn handle_scrape(State(state): State<AppState>) -> Json<Value> {
    let outcome = state.pipeline.start_background();
    Json(json!({ "status": outcome.as_str() }))
}

async fn handle_scrape_status(State(state): State<AppState>) -> Json<RunState> {
    Json(state.pipeline.status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::migrate;
    use crate::models::{Category, Classification, ItemKind, MarketSize, NewItem};
    use tempfile::TempDir;

    async fn state_with_items() -> (TempDir, AppState, String) {
        let dir = TempDir::new().unwrap();
        let pool = db::connect_path(&dir.path().join("test.sqlite"))
            .await
            .unwrap();
        migrate::apply_schema(&pool).await.unwrap();
        let store = Store::new(pool);

        let mut first_id = String::new();
        for (n, score) in [(1, 80), (2, 40)] {
            let id = store
                .insert_item(&NewItem {
                    external_id: format!("t3_s{}", n),
                    subreddit: "SaaS".to_string(),
                    title: format!("I wish tool {}", n),
                    body: String::new(),
                    author: "a".to_string(),
                    url: String::new(),
                    score: 10 * n,
                    num_comments: n,
                    created_utc: 0,
                    kind: ItemKind::Submission,
                    parent_external_id: None,
                })
                .await
                .unwrap();
            store
                .insert_classification(
                    &id,
                    &Classification {
                        pain_point_summary: format!("summary {}", n),
                        category: Category::Productivity,
                        severity: 3,
                        affected_audience: "teams".to_string(),
                        potential_solutions: vec!["build it".to_string()],
                        market_size: MarketSize::from_estimate("Medium - ok"),
                        existing_solutions: vec![],
                        opportunity_score: score,
                        raw_llm_response: "{}".to_string(),
                    },
                )
                .await
                .unwrap();
            if n == 1 {
                first_id = id;
            }
        }

        let pipeline = Pipeline::new(Config::minimal(), store);
        (dir, AppState::new(pipeline), first_id)
    }

    #[tokio::test]
    async fn list_filters_and_pages() {
        let (_dir, state, _) = state_with_items().await;

        let params = ListParams {
            min_score: Some(50),
            ..ListParams::default()
        };
        let Json(body) = handle_list(State(state.clone()), Ok(Query(params)))
            .await
            .unwrap();
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"][0]["opportunity_score"], 80);
        assert_eq!(body["limit"], 50);

        let params = ListParams {
            sort_by: Some("bogus".to_string()),
            order: Some("asc".to_string()),
            ..ListParams::default()
        };
        let Json(body) = handle_list(State(state), Ok(Query(params))).await.unwrap();
        assert_eq!(body["items"][0]["opportunity_score"], 40);
    }

    #[tokio::test]
    async fn oversized_page_is_bad_request() {
        let (_dir, state, _) = state_with_items().await;
        let params = ListParams {
            limit: Some(500),
            ..ListParams::default()
        };
        let err = handle_list(State(state), Ok(Query(params))).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "bad_request");
    }

    #[tokio::test]
    async fn get_returns_raw_or_not_found() {
        let (_dir, state, id) = state_with_items().await;

        let Json(body) = handle_get(State(state.clone()), Path(id)).await.unwrap();
        assert_eq!(body["raw_llm_response"], "{}");
        assert_eq!(body["potential_solutions"][0], "build it");

        let err = handle_get(State(state), Path("missing".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn aggregates_and_trending() {
        let (_dir, state, _) = state_with_items().await;

        let Json(stats) = handle_stats(State(state.clone())).await.unwrap();
        assert_eq!(stats["total_items"], 2);
        assert_eq!(stats["avg_opportunity_score"], 60.0);

        let Json(cats) = handle_categories(State(state.clone())).await.unwrap();
        assert_eq!(cats["categories"][0]["category"], "Productivity");
        assert_eq!(cats["categories"][0]["count"], 2);

        let Json(trending) = handle_trending(State(state.clone()), Ok(Query(TrendingParams::default())))
            .await
            .unwrap();
        assert_eq!(trending["items"].as_array().unwrap().len(), 2);

        let err = handle_trending(State(state), Ok(Query(TrendingParams { limit: Some(51) })))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn export_csv_sets_attachment_header() {
        let (_dir, state, _) = state_with_items().await;

        let response = handle_export(
            State(state.clone()),
            Ok(Query(ExportParams {
                format: Some("csv".to_string()),
            })),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=pain_points.csv"
        );

        let err = handle_export(
            State(state),
            Ok(Query(ExportParams {
                format: Some("xml".to_string()),
            })),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn scrape_is_single_flight() {
        let (_dir, state, _) = state_with_items().await;
        let _guard = state.pipeline.try_begin().unwrap();

        let Json(body) = handle_scrape(State(state.clone())).await;
        assert_eq!(body["status"], "already_running");

        let Json(status) = handle_scrape_status(State(state)).await;
        assert!(status.running);
    }

    #[tokio::test]
    async fn malformed_query_uses_error_contract() {
        let (_dir, state, _) = state_with_items().await;
        let base = crate::testing::serve_router(router(state)).await;
        let client = reqwest::Client::new();

        for path in [
            "/api/pain-points?min_score=abc",
            "/api/trending?limit=ten",
            "/api/pain-points?limit=500",
        ] {
            let response = client
                .get(format!("{}{}", base, path))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST, "{}", path);
            let body: Value = response.json().await.unwrap();
            assert_eq!(body["error"]["code"], "bad_request", "{}", path);
            assert!(body["error"]["message"].as_str().is_some());
        }

        let response = client
            .get(format!("{}/api/pain-points?min_score=50", base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["total"], 1);
    }
}
