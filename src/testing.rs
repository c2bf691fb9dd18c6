//! Local HTTP server with scripted replies for upstream client tests.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::any, Json, Router};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Replies served in order to successive requests on one route. The last
/// reply repeats once the script runs out.
#[derive(Clone)]
pub struct Script {
    replies: Arc<Vec<(u16, Value)>>,
    hits: Arc<AtomicUsize>,
}

impl Script {
    pub fn new(replies: Vec<(u16, Value)>) -> Self {
        assert!(!replies.is_empty());
        Self {
            replies: Arc::new(replies),
            hits: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn reply(State(script): State<Script>) -> impl IntoResponse {
    let n = script.hits.fetch_add(1, Ordering::SeqCst);
    let (status, body) = script.replies[n.min(script.replies.len() - 1)].clone();
    (StatusCode::from_u16(status).unwrap(), Json(body))
}

/// Serve `routes` on an ephemeral port. Returns the base URL.
pub async fn serve_scripts(routes: Vec<(&str, Script)>) -> String {
    let mut app = Router::new();
    for (path, script) in routes {
        app = app.route(path, any(reply).with_state(script));
    }
    serve_router(app).await
}

/// Serve any router on an ephemeral port. Returns the base URL.
pub async fn serve_router(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}
