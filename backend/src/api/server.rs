//! HTTP Server for the ordermart query API.
//!
//! # API Endpoints
//!
//! | Method | Path           | Description                             |
//! |--------|----------------|-----------------------------------------|
//! | GET    | `/health`      | Health check                            |
//! | GET    | `/api/options` | Date bounds and filter values           |
//! | POST   | `/api/query`   | Window/filter query (200, 202 or 400)   |
//! | GET    | `/api/logs`    | SSE stream for real-time logs           |

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_info, log_warning, LOG_BROADCASTER};
use super::types::{error_response, OptionsResponse, QueryEnvelope, QueryStatus};
use crate::config::StoreConfig;
use crate::error::ServerResult;
use crate::query::{QueryEngine, QueryRequest};

const QUICK_RANGES: [&str; 5] = ["7d", "30d", "qtd", "ytd", "all"];

/// Shared handler state; the engine is immutable and needs no lock.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
    pub top_n: usize,
}

impl AppState {
    pub fn new(engine: QueryEngine, top_n: usize) -> Self {
        Self {
            engine: Arc::new(engine),
            top_n,
        }
    }

    /// Load the query engine from the curated store.
    pub fn load(store: &StoreConfig, top_n: usize) -> ServerResult<Self> {
        let engine = QueryEngine::load(store)?;
        log_info(format!(
            "Loaded {} fact rows, {} months from {}",
            engine.fact_rows().len(),
            engine.monthly_rows().len(),
            store.curated_dir.display()
        ));
        Ok(Self::new(engine, top_n))
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/options", get(options))
        .route("/api/query", post(query))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: AppState, port: u16) -> ServerResult<()> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Ordermart server running on http://localhost:{}", port);
    println!("   POST /api/query   - Window/filter query");
    println!("   GET  /api/options - Date bounds and filter values");
    println!("   GET  /api/logs    - SSE log stream");
    println!("   GET  /health      - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "ordermart",
        "version": env!("CARGO_PKG_VERSION"),
        "factRows": state.engine.fact_rows().len(),
        "months": state.engine.monthly_rows().len(),
        "endpoints": {
            "options": "GET /api/options",
            "query": "POST /api/query",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

async fn options(State(state): State<AppState>) -> Json<OptionsResponse> {
    Json(OptionsResponse {
        date_bounds: state.engine.date_bounds(),
        dimensions: state.engine.dimension_options(),
        quick_ranges: QUICK_RANGES.to_vec(),
        default_top_n: state.top_n,
    })
}

async fn query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let Json(mut request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            log_warning(format!("Rejected query body: {}", rejection.body_text()));
            return (
                StatusCode::BAD_REQUEST,
                Json(error_response(&rejection.body_text())),
            );
        }
    };
    request.top_n.get_or_insert(state.top_n);

    let envelope = QueryEnvelope::from(state.engine.query(&request));
    let code = match envelope.status {
        QueryStatus::Ready => StatusCode::OK,
        QueryStatus::NotReady => StatusCode::ACCEPTED,
        QueryStatus::Error => StatusCode::BAD_REQUEST,
    };
    log_info(format!(
        "Query {} → {:?}{}",
        envelope.request_id,
        envelope.status,
        envelope
            .message
            .as_deref()
            .map(|m| format!(" ({})", m))
            .unwrap_or_default()
    ));

    let body = serde_json::to_value(&envelope)
        .unwrap_or_else(|e| error_response(&format!("Serialization error: {}", e)));
    (code, Json(body))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ServerError, StoreError};
    use crate::marts::{build_fact_orders, build_orders_monthly};
    use crate::transform::cleaning::basic_clean;
    use crate::transform::cleaning::tests::{line, raw};
    use crate::transform::enrich::add_enriched_fields;

    fn state() -> AppState {
        let rows = [line("O-1", "100", "0.2", "50"), line("O-2", "300", "0.4", "-30")];
        let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        let enriched = add_enriched_fields(&basic_clean(&raw(&refs)).unwrap());
        let engine = QueryEngine::new(
            build_fact_orders(&enriched.records),
            build_orders_monthly(&enriched.records),
        );
        AppState::new(engine, 5)
    }

    #[tokio::test]
    async fn test_query_ready() {
        let request = QueryRequest::new("2016-11-01", "2016-11-30");
        let (code, Json(body)) = query(State(state()), Ok(Json(request))).await;

        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"], "ready");
        assert_eq!(body["result"]["kpis"]["totalSales"], 400.0);
        assert_eq!(body["result"]["path"], "fast");
    }

    #[tokio::test]
    async fn test_query_not_ready() {
        let request = QueryRequest {
            start_date: Some("2016-11-01".into()),
            ..QueryRequest::default()
        };
        let (code, Json(body)) = query(State(state()), Ok(Json(request))).await;

        assert_eq!(code, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "not_ready");
        assert_eq!(body["reason"]["kind"], "missing_end_date");
    }

    #[tokio::test]
    async fn test_query_inverted_window() {
        let request = QueryRequest::new("2016-12-01", "2016-11-01");
        let (code, Json(body)) = query(State(state()), Ok(Json(request))).await;

        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_options() {
        let Json(body) = options(State(state())).await;

        assert_eq!(body.dimensions.categories, vec!["Furniture"]);
        assert_eq!(body.default_top_n, 5);
        let bounds = body.date_bounds.unwrap();
        assert_eq!(bounds.start, bounds.end);
    }

    #[test]
    fn test_load_without_curated_tables() {
        let dir = tempfile::tempdir().unwrap();

        match AppState::load(&StoreConfig::new(dir.path()), 5) {
            Err(ServerError::Store(StoreError::MissingSource { path })) => {
                assert!(path.ends_with("fact_orders.csv"));
            }
            Err(other) => panic!("expected a missing source, got {other:?}"),
            Ok(_) => panic!("expected a missing source"),
        }
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health(State(state())).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["factRows"], 2);
    }
}
