//! Protocol router — the conversation state machine.
//!
//! There is no separate FSM state field: state is whatever the shape of
//! `Session.brief` and `Session.todos` says it is. The router classifies one
//! inbound message, applies its mutation to the session snapshot it was
//! given, and reports the replies to send plus whether the connection should
//! finish. Persisting the mutated snapshot is the caller's job.

use atelier_protocol::{
    BriefUpdate, ClientMessage, ServerMessage, Session, SyncError, SyncResult,
    fallback_todo_preview, merge_brief,
};
use tracing::debug;

/// What the connection should do once the replies are flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Keep the connection open and process the next message.
    Continue,
    /// Close with the normal closure code; the call is over.
    Finish,
}

/// Result of routing one inbound message.
#[derive(Debug)]
pub struct RouterOutcome {
    pub replies: Vec<ServerMessage>,
    pub disposition: Disposition,
    /// Whether the session snapshot changed and must be saved.
    pub mutated: bool,
}

impl RouterOutcome {
    fn reply(message: ServerMessage) -> Self {
        Self {
            replies: vec![message],
            disposition: Disposition::Continue,
            mutated: false,
        }
    }

    fn mutation(replies: Vec<ServerMessage>, disposition: Disposition) -> Self {
        Self {
            replies,
            disposition,
            mutated: true,
        }
    }
}

/// Route one inbound message against the bound session.
///
/// The mutation is applied fully to `session` before returning; on error the
/// session is left exactly as it was.
pub fn route(
    session: &mut Session,
    message: ClientMessage,
    now_ms: i64,
) -> SyncResult<RouterOutcome> {
    match message {
        ClientMessage::UiResponse {
            prompt_id,
            selected_option_id,
        } => {
            let update = classify_prompt(&prompt_id, &selected_option_id);
            session.brief = merge_brief(&session.brief, &update);
            session.push_approval(
                now_ms,
                format!("UI_RESPONSE {prompt_id} -> {selected_option_id}"),
            );
            debug!(%prompt_id, "ui response applied to brief");
            Ok(RouterOutcome::mutation(Vec::new(), Disposition::Continue))
        }
        ClientMessage::TodoConfirm { ok: true } => {
            session.push_approval(now_ms, "TODO_CONFIRM accepted");
            let finished = ServerMessage::CallFinished {
                session_id: session.id.clone(),
            };
            Ok(RouterOutcome::mutation(
                vec![finished],
                Disposition::Finish,
            ))
        }
        ClientMessage::TodoConfirm { ok: false } => {
            session.push_approval(now_ms, "TODO_CONFIRM rejected");
            Ok(RouterOutcome::mutation(
                vec![fallback_todo_preview()],
                Disposition::Continue,
            ))
        }
        ClientMessage::AgentNote { message } => {
            if message.trim().is_empty() {
                return Err(SyncError::EmptyAgentNote);
            }
            session.push_approval(now_ms, format!("AGENT_NOTE {message}"));
            Ok(RouterOutcome::mutation(Vec::new(), Disposition::Continue))
        }
        ClientMessage::Ping { ts } => Ok(RouterOutcome::reply(ServerMessage::Pong { ts })),
    }
}

/// Map a prompt id onto the brief field it targets.
///
/// Prompt ids beginning (case-insensitively) with `style`, `palette`, or
/// `finish` replace that scalar; every other id lands in the open
/// `constraints` bag under its own key.
fn classify_prompt(prompt_id: &str, selected_option_id: &str) -> BriefUpdate {
    let lowered = prompt_id.to_ascii_lowercase();
    let value = selected_option_id.to_owned();

    if lowered.starts_with("style") {
        BriefUpdate {
            style: Some(value),
            ..BriefUpdate::default()
        }
    } else if lowered.starts_with("palette") {
        BriefUpdate {
            palette: Some(value),
            ..BriefUpdate::default()
        }
    } else if lowered.starts_with("finish") {
        BriefUpdate {
            finish: Some(value),
            ..BriefUpdate::default()
        }
    } else {
        BriefUpdate::constraint(prompt_id, value)
    }
}
