use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;

use crate::{
    addrgen,
    scanner::ScanCoordinator,
    types::{ScanConfig, ScanState},
};

/// Read-view server state: just a handle to the coordinator. All mutation
/// goes through the coordinator's start/stop interface; handlers only read
/// snapshots.
#[derive(Clone)]
pub struct AppState {
    coordinator: ScanCoordinator,
}

#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub state: ScanState,
    pub found: usize,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub ranges: Vec<String>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub port: Option<u16>,
}

/// Serve the JSON read view (and an optional static `ui/` directory) on
/// `bind`, driving the given coordinator.
pub async fn spawn_server(bind: &str, coordinator: ScanCoordinator) -> Result<()> {
    let app = app_router(AppState { coordinator });
    println!("Serving read view on http://{}", bind);
    axum::serve(tokio::net::TcpListener::bind(bind).await?, app).await?;
    Ok(())
}

fn app_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/status", get(get_status))
        .route("/scan", post(post_scan))
        .route("/stop", post(post_stop))
        .route("/results", get(get_results))
        .with_state(state);

    let static_svc = ServeDir::new("ui").append_index_html_on_directories(true);

    Router::new().nest("/api", api).fallback_service(static_svc)
}

async fn get_status(State(app): State<AppState>) -> impl IntoResponse {
    let out = Status {
        state: app.coordinator.state(),
        found: app.coordinator.found().await,
    };
    (StatusCode::OK, Json(out))
}

async fn get_results(State(app): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(app.coordinator.snapshot().await))
}

async fn post_stop(State(app): State<AppState>) -> impl IntoResponse {
    app.coordinator.stop();
    StatusCode::OK
}

async fn post_scan(State(app): State<AppState>, Json(req): Json<ScanRequest>) -> impl IntoResponse {
    // Ranges arriving over the wire are validated strictly; the lenient
    // fallback parsing is reserved for the built-in catalog path.
    for r in &req.ranges {
        if !addrgen::validate_range(r) {
            return (StatusCode::BAD_REQUEST, format!("invalid CIDR: {r}")).into_response();
        }
    }

    // start() no-ops on an active scan; tell the caller instead of faking a
    // fresh accept.
    if app.coordinator.state() != ScanState::Idle {
        return (StatusCode::CONFLICT, "scan already active".to_string()).into_response();
    }

    let defaults = ScanConfig::default();
    let config = ScanConfig {
        ranges: req.ranges,
        concurrency: req.concurrency.unwrap_or(defaults.concurrency),
        timeout_ms: req.timeout_ms.unwrap_or(defaults.timeout_ms),
        max_results: req.max_results.unwrap_or(defaults.max_results),
        target_port: req.port.unwrap_or(defaults.target_port),
    };

    match app.coordinator.start(config).await {
        Ok(()) => {
            let out = Status {
                state: app.coordinator.state(),
                found: app.coordinator.found().await,
            };
            (StatusCode::ACCEPTED, Json(out)).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}
