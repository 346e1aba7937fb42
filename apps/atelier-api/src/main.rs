use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_stream::stream;
use atelier_kernel::{AtelierKernel, KernelBuilder, SessionEventKind};
use atelier_protocol::{Approval, ChatTurn, Role, Session, SessionId, SyncError, TodoItem, UiPrompt};
use atelier_store::FileSessionStore;
use axum::extract::{Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use clap::Parser;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

mod ws;

#[derive(Debug, Parser)]
#[command(name = "atelier-api")]
#[command(about = "Atelier consultation API")]
struct Cli {
    #[arg(long, default_value = ".atelier")]
    root: PathBuf,
    #[arg(long, default_value = "127.0.0.1:8790")]
    listen: SocketAddr,
    /// Bearer token required on session creation; unset disables the check.
    #[arg(long)]
    auth_token: Option<String>,
}

#[derive(Clone)]
struct AppState {
    kernel: AtelierKernel,
    auth_token: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CreateSessionRequest {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AppendTurnRequest {
    role: Role,
    text: String,
    ts: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApprovalListResponse {
    session_id: SessionId,
    approvals: Vec<Approval>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn map_kernel_error(error: anyhow::Error) -> ApiError {
    match error.downcast_ref::<SyncError>() {
        Some(SyncError::SessionNotFound(_)) => ApiError::not_found(error.to_string()),
        _ => ApiError::internal(error),
    }
}

fn authorize(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let Some(expected) = &state.auth_token else {
        return Ok(());
    };

    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if provided == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(ApiError::unauthorized("missing or invalid bearer token"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let store = Arc::new(FileSessionStore::new(&cli.root));
    let kernel = KernelBuilder::new(store).build();

    let state = AppState {
        kernel,
        auth_token: cli.auth_token,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/sessions", post(create_session))
        .route("/sessions/{session_id}", get(get_session))
        .route("/sessions/{session_id}/messages", post(append_message))
        .route("/sessions/{session_id}/todos", put(replace_todos))
        .route("/sessions/{session_id}/prompt", post(push_prompt))
        .route("/sessions/{session_id}/approvals", get(list_approvals))
        .route(
            "/sessions/{session_id}/approvals/stream",
            get(stream_approvals),
        )
        .route("/ws", get(ws::sync_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!(listen = %cli.listen, root = %cli.root.display(), "atelier-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "atelier-api"
    }))
}

async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateSessionRequest>,
) -> ApiResult<Json<Session>> {
    authorize(&state, &headers)?;

    let session = state
        .kernel
        .create_session(request.id.map(SessionId::from_string))
        .await
        .map_err(ApiError::internal)?;

    Ok(Json(session))
}

async fn get_session(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<Session>> {
    let session_id = SessionId::from_string(session_id);
    let session = state
        .kernel
        .session(&session_id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found(format!("session not found: {session_id}")))?;

    Ok(Json(session))
}

async fn append_message(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<AppendTurnRequest>,
) -> ApiResult<StatusCode> {
    let session_id = SessionId::from_string(session_id);
    let turn = ChatTurn {
        role: request.role,
        text: request.text,
        ts: request.ts.unwrap_or_else(|| Utc::now().timestamp_millis()),
    };

    state
        .kernel
        .append_turn(&session_id, turn)
        .await
        .map_err(map_kernel_error)?;

    Ok(StatusCode::NO_CONTENT)
}

async fn replace_todos(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    Json(todos): Json<Vec<TodoItem>>,
) -> ApiResult<StatusCode> {
    let session_id = SessionId::from_string(session_id);
    state
        .kernel
        .replace_todos(&session_id, todos)
        .await
        .map_err(map_kernel_error)?;

    Ok(StatusCode::NO_CONTENT)
}

async fn push_prompt(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    Json(prompt): Json<UiPrompt>,
) -> ApiResult<StatusCode> {
    let session_id = SessionId::from_string(session_id);
    state
        .kernel
        .push_prompt(&session_id, prompt)
        .await
        .map_err(map_kernel_error)?;

    Ok(StatusCode::ACCEPTED)
}

async fn list_approvals(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<ApprovalListResponse>> {
    let session_id = SessionId::from_string(session_id);
    let approvals = state
        .kernel
        .approvals(&session_id)
        .await
        .map_err(map_kernel_error)?;

    Ok(Json(ApprovalListResponse {
        session_id,
        approvals,
    }))
}

async fn stream_approvals(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let session_id = SessionId::from_string(session_id);
    if state
        .kernel
        .session(&session_id)
        .await
        .map_err(ApiError::internal)?
        .is_none()
    {
        return Err(ApiError::not_found(format!(
            "session not found: {session_id}"
        )));
    }

    let mut events = state.kernel.subscribe();
    let stream = stream! {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if event.session_id != session_id {
                        continue;
                    }
                    if let SessionEventKind::ApprovalAppended(approval) = event.kind {
                        yield Ok(as_sse_event("session.approval", &approval));
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    let lag_payload = json!({ "skipped": skipped }).to_string();
                    yield Ok(Event::default().event("stream.lagged").data(lag_payload));
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}

fn as_sse_event(event_name: &str, approval: &Approval) -> Event {
    let payload = serde_json::to_string(approval)
        .unwrap_or_else(|error| json!({ "error": error.to_string() }).to_string());
    Event::default().event(event_name).data(payload)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    {
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(error) => {
                    tracing::error!(%error, "failed to install SIGTERM handler");
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
