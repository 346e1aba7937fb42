//! The sync connection — one logical session-to-connection binding.
//!
//! Each text frame is handled in isolation: a failure produces an `ERROR`
//! reply and the loop keeps going. Only a `TODO_CONFIRM{ok:true}` (normal
//! closure) or a transport-level failure ends the connection; the stored
//! session outlives both.

use std::ops::ControlFlow;

use atelier_kernel::{Disposition, SessionEventKind};
use atelier_protocol::{
    CLOSE_NORMAL, CLOSE_POLICY_VIOLATION, ClientMessage, REASON_CALL_FINISHED,
    REASON_MISSING_SESSION_ID, ServerMessage, SessionId,
};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct SyncQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

pub async fn sync_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<SyncQuery>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_sync_socket(state, query.session_id, socket))
}

async fn handle_sync_socket(state: AppState, session_id: Option<String>, mut socket: WebSocket) {
    // No sessionId, no session: reject before anything is allocated.
    let Some(raw_id) = session_id.filter(|raw| !raw.is_empty()) else {
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: CLOSE_POLICY_VIOLATION,
                reason: REASON_MISSING_SESSION_ID.into(),
            })))
            .await;
        return;
    };

    let session_id = SessionId::from_string(raw_id);
    if let Err(error) = state.kernel.open_session(&session_id).await {
        warn!(%session_id, %error, "failed to bind session");
        let reply = ServerMessage::Error {
            error: error.to_string(),
        };
        let _ = send_json(&mut socket, &reply).await;
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    info!(%session_id, "sync connection bound");

    let mut events = state.kernel.subscribe();
    loop {
        tokio::select! {
            inbound = socket.next() => {
                let Some(message) = inbound else { break };
                match message {
                    Ok(Message::Text(text)) => {
                        if handle_frame(&state, &session_id, text.as_str(), &mut socket)
                            .await
                            .is_break()
                        {
                            break;
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(error) => {
                        warn!(%session_id, %error, "websocket transport error");
                        break;
                    }
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) if event.session_id == session_id => {
                        if let SessionEventKind::Outbound(message) = event.kind
                            && send_json(&mut socket, &message).await.is_err()
                        {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(%session_id, skipped, "event subscription lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    info!(%session_id, "sync connection closed");
}

async fn handle_frame(
    state: &AppState,
    session_id: &SessionId,
    raw: &str,
    socket: &mut WebSocket,
) -> ControlFlow<()> {
    let message: ClientMessage = match serde_json::from_str(raw) {
        Ok(message) => message,
        Err(error) => {
            debug!(%session_id, %error, "unparseable frame");
            let reply = ServerMessage::Error {
                error: format!("malformed message: {error}"),
            };
            return continue_unless_disconnected(send_json(socket, &reply).await);
        }
    };

    match state.kernel.apply(session_id, message).await {
        Ok(applied) => {
            for reply in &applied.replies {
                if send_json(socket, reply).await.is_err() {
                    return ControlFlow::Break(());
                }
            }
            if applied.disposition == Disposition::Finish {
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code: CLOSE_NORMAL,
                        reason: REASON_CALL_FINISHED.into(),
                    })))
                    .await;
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        }
        Err(error) => {
            // Fault isolation: the message failed, the connection survives.
            debug!(%session_id, %error, "message handling failed");
            let reply = ServerMessage::Error {
                error: error.to_string(),
            };
            continue_unless_disconnected(send_json(socket, &reply).await)
        }
    }
}

fn continue_unless_disconnected(sent: Result<(), axum::Error>) -> ControlFlow<()> {
    match sent {
        Ok(()) => ControlFlow::Continue(()),
        Err(_) => ControlFlow::Break(()),
    }
}

async fn send_json(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), axum::Error> {
    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(%error, "failed to serialize outbound message");
            return Ok(());
        }
    };
    socket.send(Message::Text(payload.into())).await
}
