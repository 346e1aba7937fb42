//! # atelier-protocol — Atelier consultation contract
//!
//! Shared types for the painting-consultation platform: the session
//! aggregate, the painting brief and its merge semantics, and the wire
//! messages spoken over the real-time sync connection.
//!
//! Intentionally dependency-light (no tokio, no axum) so it can be used as a
//! pure contract crate by servers, tools, and tests alike.
//!
//! ## Module Overview
//!
//! - [`ids`] — typed ID wrappers
//! - [`session`] — `Session`, `ChatTurn`, `TodoItem`, `Approval`
//! - [`brief`] — `PaintingBrief`, `BriefUpdate`, `merge_brief`
//! - [`wire`] — `ClientMessage`/`ServerMessage` tagged unions, close codes
//! - [`error`] — `SyncError`, `SyncResult`

pub mod brief;
pub mod error;
pub mod ids;
pub mod session;
pub mod wire;

// Re-export the most commonly used types at the crate root.
pub use brief::{BriefUpdate, PaintingBrief, merge_brief};
pub use error::{SyncError, SyncResult};
pub use ids::SessionId;
pub use session::{Approval, ChatTurn, Role, Session, TodoItem, TodoStatus};
pub use wire::{
    CLOSE_NORMAL, CLOSE_POLICY_VIOLATION, ClientMessage, FALLBACK_TODO_ITEMS, PromptOption,
    REASON_CALL_FINISHED, REASON_MISSING_SESSION_ID, ServerMessage, UiPrompt,
    fallback_todo_preview,
};
