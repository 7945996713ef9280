//! Local projection server.
//!
//! Serves the session's projections as JSON and pushes store events over a
//! WebSocket. The two action endpoints and chat forward to the session; all
//! other routes only read.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use super::actions::validate_connect;
use super::aggregate::StatusFilter;
use super::session::DashboardSession;
use super::view::{DashboardView, JobDetail, JobsView, RepositoryRow};
use super::ws;

/// Configuration for the projection server.
pub struct ServerConfig {
    pub port: u16,
    pub recent_jobs_limit: usize,
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3142,
            recent_jobs_limit: super::view::DEFAULT_RECENT_JOBS,
            dev_mode: false,
        }
    }
}

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub session: Arc<DashboardSession>,
    pub recent_jobs_limit: usize,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ConnectBody {
    pub repo_url: String,
    #[serde(default)]
    pub repo_name: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Deserialize)]
pub struct ChatBody {
    pub message: String,
}

#[derive(Deserialize)]
pub struct JobsQuery {
    #[serde(default)]
    pub status: Option<String>,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// The backend rejected or could not serve the request.
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/repositories", get(list_repositories))
        .route("/api/repositories/connect", post(connect_repository))
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/{id}", get(get_job))
        .route("/api/stats", get(get_stats))
        .route("/api/demo/trigger", post(trigger_demo))
        .route("/api/chat", get(list_chat).post(send_chat))
        .route("/health", get(health_check))
}

/// Build the full application router with API and WebSocket.
pub fn build_router(state: SharedState) -> Router {
    api_router()
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    let backend = state.session.health().await;
    Json(serde_json::json!({
        "status": "ok",
        "backend": backend,
    }))
}

async fn get_dashboard(State(state): State<SharedState>) -> Json<DashboardView> {
    let snapshot = state.session.snapshot();
    Json(DashboardView::project(&snapshot, state.recent_jobs_limit, Utc::now()))
}

async fn list_repositories(State(state): State<SharedState>) -> Json<Vec<RepositoryRow>> {
    let snapshot = state.session.snapshot();
    Json(snapshot.repositories.iter().map(RepositoryRow::from).collect())
}

async fn list_jobs(
    State(state): State<SharedState>,
    Query(query): Query<JobsQuery>,
) -> Json<JobsView> {
    let filter = query
        .status
        .as_deref()
        .map(|s| s.parse::<StatusFilter>().unwrap_or_default())
        .unwrap_or_default();
    let snapshot = state.session.snapshot();
    Json(JobsView::project(&snapshot, &filter, Utc::now()))
}

async fn get_job(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<JobDetail>, ApiError> {
    if let Some(detail) = JobDetail::project(&state.session.snapshot(), &id, Utc::now()) {
        return Ok(Json(detail));
    }
    // Not seen by polling yet; ask the backend directly.
    state.session.refresh_job(&id).await;
    JobDetail::project(&state.session.snapshot(), &id, Utc::now())
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Job {} not found", id)))
}

async fn get_stats(State(state): State<SharedState>) -> impl IntoResponse {
    let view = DashboardView::project(&state.session.snapshot(), state.recent_jobs_limit, Utc::now());
    Json(serde_json::json!({
        "stats": view.stats,
        "local": view.local_stats,
        "counts": view.counts,
    }))
}

async fn connect_repository(
    State(state): State<SharedState>,
    Json(body): Json<ConnectBody>,
) -> Result<impl IntoResponse, ApiError> {
    let name = body.repo_name.as_deref();
    if let Err(e) = validate_connect(&body.repo_url, name, body.access_token.as_deref()) {
        return Err(ApiError::BadRequest(e.to_string()));
    }
    let connected = state
        .session
        .connect_repository(&body.repo_url, name, body.access_token.as_deref())
        .await;
    if !connected {
        return Err(ApiError::Upstream("Failed to connect repository".into()));
    }
    Ok(Json(serde_json::json!({"success": true})))
}

async fn trigger_demo(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    if !state.session.trigger_demo_analysis().await {
        return Err(ApiError::Upstream("Failed to trigger demo analysis".into()));
    }
    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({"success": true}))))
}

async fn list_chat(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.session.chat_messages())
}

async fn send_chat(
    State(state): State<SharedState>,
    Json(body): Json<ChatBody>,
) -> Result<impl IntoResponse, ApiError> {
    match state.session.send_chat_message(&body.message) {
        Some(message) => Ok((StatusCode::CREATED, Json(message))),
        None => Err(ApiError::BadRequest("Message must not be empty".into())),
    }
}

// ── Server ────────────────────────────────────────────────────────────

/// Start the projection server and run until Ctrl+C.
pub async fn start_server(config: ServerConfig, session: Arc<DashboardSession>) -> Result<()> {
    let state = Arc::new(AppState {
        session: Arc::clone(&session),
        recent_jobs_limit: config.recent_jobs_limit,
    });

    let mut app = build_router(state);
    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    println!("DevAgent dashboard running at http://{}", local_addr);
    tracing::info!(%local_addr, "Projection server listening");

    session.start();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    session.shutdown().await;
    println!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    println!("\nShutting down...");
}
