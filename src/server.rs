use crate::error::ScraperError;
use crate::pipeline::{SyncMode, SyncWorkflow};
use axum::{
    extract::Query,
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use hyper::Server;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<SyncWorkflow>,
    /// Cancelled on shutdown; runs triggered over HTTP get a child token.
    pub shutdown: CancellationToken,
}

/// Optional source filter, from the JSON body or the query string.
#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    #[serde(alias = "scrapeOnly")]
    pub scrape_only: Option<String>,
}

impl RunRequest {
    fn sources(&self) -> Option<Vec<String>> {
        let names: Vec<String> = self
            .scrape_only
            .as_deref()?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        (!names.is_empty()).then_some(names)
    }
}

fn error_status(e: &ScraperError) -> StatusCode {
    match e {
        ScraperError::SyncInProgress => StatusCode::CONFLICT,
        ScraperError::LedgerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ScraperError::Config(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Health check endpoint
async fn health(Extension(state): Extension<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "event_sync",
        "version": env!("CARGO_PKG_VERSION"),
        "sync_running": state.workflow.is_running(),
        "state": state.workflow.state(),
        "sources": state.workflow.source_names(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn trigger(state: AppState, mode: SyncMode, request: RunRequest) -> Response {
    let only = request.sources();
    let cancel = state.shutdown.child_token();

    match state.workflow.run(mode, only.as_deref(), &cancel).await {
        Ok(report) => Json(json!({
            "success": true,
            "report": report,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }))
        .into_response(),
        Err(e) => {
            let status = error_status(&e);
            if status == StatusCode::CONFLICT {
                warn!("Rejected {} sync trigger: {}", mode.as_str(), e);
            } else {
                error!("{} sync failed: {}", mode.as_str(), e);
            }
            (
                status,
                Json(json!({
                    "success": false,
                    "error": e.to_string(),
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                })),
            )
                .into_response()
        }
    }
}

fn merge(query: RunRequest, body: Option<Json<RunRequest>>) -> RunRequest {
    match body {
        Some(Json(body)) if body.scrape_only.is_some() => body,
        _ => query,
    }
}

/// Incremental sync: only events the ledger has not seen
async fn run_incremental(
    Extension(state): Extension<AppState>,
    Query(query): Query<RunRequest>,
    body: Option<Json<RunRequest>>,
) -> Response {
    info!("📡 /run called - incremental sync");
    trigger(state, SyncMode::Incremental, merge(query, body)).await
}

/// Full sync: clears the ledger and delivers everything collected
async fn run_full(
    Extension(state): Extension<AppState>,
    Query(query): Query<RunRequest>,
    body: Option<Json<RunRequest>>,
) -> Response {
    warn!("⚠️  /sync-all called - full sync, the ledger will be cleared");
    trigger(state, SyncMode::Full, merge(query, body)).await
}

/// Create the HTTP router with all routes
pub fn create_server(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/run", post(run_incremental))
        .route("/sync-all", post(run_full))
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
}

/// Serve on `addr` until `state.shutdown` is cancelled.
pub async fn start_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let app = create_server(state);

    println!("🚀 HTTP server running on http://{addr}");
    println!("💚 Health check: http://{addr}/health");
    println!("🔄 Incremental:  POST http://{addr}/run");
    println!("⚠️  Full sync:    POST http://{addr}/sync-all");

    Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{Deliverer, DeliveryClient, RetryPolicy};
    use crate::error::Result;
    use crate::pipeline::SyncOptions;
    use crate::storage::{InMemoryLedger, Ledger};
    use crate::types::{CanonicalEvent, RawCandidate, SourceAdapter};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    struct OneGig;

    #[async_trait]
    impl SourceAdapter for OneGig {
        fn name(&self) -> &str {
            "onegig"
        }
        async fn fetch(&self) -> Result<Vec<RawCandidate>> {
            Ok(vec![RawCandidate::new("Lowlands", "2030-08-16", "OneGig").with_city("Biddinghuizen")])
        }
    }

    struct Accepting;

    #[async_trait]
    impl DeliveryClient for Accepting {
        async fn send(&self, _event: &CanonicalEvent) -> Result<()> {
            Ok(())
        }
    }

    fn state(ledger: InMemoryLedger) -> AppState {
        let workflow = SyncWorkflow::new(
            vec![Arc::new(OneGig)],
            Arc::new(ledger),
            Deliverer::new(Arc::new(Accepting), RetryPolicy::new(3, Duration::ZERO, Duration::ZERO)),
            SyncOptions::default(),
        );
        AppState { workflow: Arc::new(workflow), shutdown: CancellationToken::new() }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_idle_workflow() {
        let app = create_server(state(InMemoryLedger::new()));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["state"], "idle");
        assert_eq!(body["sync_running"], false);
    }

    #[tokio::test]
    async fn run_delivers_then_skips_on_repeat() {
        let app = create_server(state(InMemoryLedger::new()));

        let first = app
            .clone()
            .oneshot(Request::post("/run").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(body_json(first).await["report"]["delivered"], 1);

        let second = app
            .oneshot(Request::post("/run").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(second).await;
        assert_eq!(body["report"]["new"], 0);
        assert_eq!(body["report"]["mode"], "incremental");
    }

    #[tokio::test]
    async fn scrape_only_filters_sources() {
        let app = create_server(state(InMemoryLedger::new()));
        let response = app
            .oneshot(
                Request::post("/sync-all")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"scrapeOnly":"OneGig"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["report"]["collected"], 1);
        assert_eq!(body["report"]["mode"], "full");
    }

    #[tokio::test]
    async fn unknown_scrape_only_is_rejected_without_touching_the_ledger() {
        let ledger = InMemoryLedger::new();
        ledger.record("0123456789abcdef").await.unwrap();
        let app = create_server(state(ledger.clone()));

        let response = app
            .oneshot(
                Request::post("/sync-all?scrapeOnly=somewhere-else")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["success"], false);
        assert_eq!(ledger.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn ledger_outage_is_service_unavailable() {
        let ledger = InMemoryLedger::new();
        ledger.set_unavailable(true);
        let app = create_server(state(ledger));

        let response = app
            .oneshot(Request::post("/run").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["success"], false);
    }

    #[test]
    fn scrape_only_is_split_and_trimmed() {
        let request = RunRequest { scrape_only: Some(" FestivalFans, ,TicketSwap ".into()) };
        assert_eq!(
            request.sources(),
            Some(vec!["FestivalFans".to_string(), "TicketSwap".to_string()])
        );
        assert_eq!(RunRequest::default().sources(), None);
    }
}
