pub mod page;
pub mod ws;

use crate::terminal::SessionManager;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect},
    routing::get,
    Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// JSON envelope of the `/api/*` routes.
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> (StatusCode, axum::Json<Self>) {
        (
            StatusCode::OK,
            axum::Json(Self {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
    }
}

impl ApiResponse<()> {
    pub fn err(status: StatusCode, msg: impl Into<String>) -> (StatusCode, axum::Json<Self>) {
        (
            status,
            axum::Json(Self {
                success: false,
                data: None,
                error: Some(msg.into()),
            }),
        )
    }
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }
}

/// Bind `listen_addr` and serve the terminal until `shutdown` fires.
pub async fn start_api_server(
    listen_addr: &str,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!(addr = %listen_addr, "Terminal server listening");
    start_api_server_on_listener(listener, state, shutdown).await
}

/// Serve on a listener the caller already bound, e.g. port 0 in tests.
pub async fn start_api_server_on_listener(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.cancelled_owned())
    .await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::permanent("/terminal") }))
        .route("/terminal", get(page::serve_terminal))
        .route("/ws", get(ws::ws_handler))
        .route("/livez", get(|| async { "ok" }))
        .route("/readyz", get(readyz_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/status", get(status_handler))
        .fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(state)
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.sessions.context().metrics.encode_text() {
        Ok(buffer) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            buffer,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Metrics encoding failed");
            ApiResponse::err(StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed")
                .into_response()
        }
    }
}

/// `/readyz`: ready once at least one account can log in.
#[derive(Serialize)]
struct Readiness {
    ready: bool,
    users: usize,
    storage: &'static str,
    audit: &'static str,
}

async fn readyz_handler(State(state): State<AppState>) -> impl IntoResponse {
    let ctx = state.sessions.context();
    let users = ctx.store.user_count();
    let body = Readiness {
        ready: users > 0,
        users,
        storage: match ctx.store.snapshot_path() {
            Some(_) => "file",
            None => "memory",
        },
        audit: if ctx.audit.is_enabled() { "file" } else { "off" },
    };
    let status = match body.ready {
        true => StatusCode::OK,
        false => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, axum::Json(body))
}

#[derive(Serialize)]
struct StatusDetail {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    active_sessions: usize,
    audit_dropped: u64,
}

async fn not_found_handler(uri: axum::http::Uri) -> impl IntoResponse {
    ApiResponse::err(StatusCode::NOT_FOUND, format!("no route for {}", uri.path()))
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let ctx = state.sessions.context();
    ApiResponse::ok(StatusDetail {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: ctx.start_time.elapsed().as_secs(),
        active_sessions: state.sessions.active_sessions(),
        audit_dropped: ctx.audit.dropped_count(),
    })
}
