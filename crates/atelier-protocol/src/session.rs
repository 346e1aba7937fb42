//! Session aggregate — the root record for one consultation.

use crate::brief::PaintingBrief;
use crate::ids::SessionId;
use serde::{Deserialize, Serialize};

/// Speaker of a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Agent,
}

/// One turn of the spoken conversation. Appended by the external transcript
/// source, never mutated by the sync protocol itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
    /// Milliseconds since epoch.
    pub ts: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoStatus {
    Todo,
    Done,
}

/// A follow-up task produced once the brief is considered complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub text: String,
    pub status: TodoStatus,
}

/// Immutable audit entry recording a state-changing decision.
///
/// Free text by design: the only consumer is the dashboard's human-readable
/// review screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    /// Milliseconds since epoch.
    pub ts: i64,
    pub text: String,
}

/// The root record for one conversation.
///
/// Exists in the store from the moment it is first requested or created and
/// is never deleted during the conversation's lifetime. `messages` and
/// `approvals` are append-only; `brief` is mutated in place by merges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    /// Milliseconds since epoch; immutable after creation.
    pub created_at: i64,
    #[serde(default)]
    pub messages: Vec<ChatTurn>,
    #[serde(default)]
    pub brief: PaintingBrief,
    #[serde(default)]
    pub todos: Vec<TodoItem>,
    #[serde(default)]
    pub approvals: Vec<Approval>,
}

impl Session {
    /// A fresh, empty session record.
    pub fn new(id: SessionId, created_at: i64) -> Self {
        Self {
            id,
            created_at,
            messages: Vec::new(),
            brief: PaintingBrief::default(),
            todos: Vec::new(),
            approvals: Vec::new(),
        }
    }

    pub fn push_approval(&mut self, ts: i64, text: impl Into<String>) {
        self.approvals.push(Approval {
            ts,
            text: text.into(),
        });
    }
}
