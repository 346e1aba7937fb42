use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use atelier_protocol::{
    Approval, ChatTurn, ClientMessage, ServerMessage, Session, SessionId, SyncError, TodoItem,
    UiPrompt,
};
use atelier_store::SessionStore;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, info, instrument};

mod hub;
mod router;

pub use hub::{SessionEvent, SessionEventKind, SessionHub};
pub use router::{Disposition, RouterOutcome, route};

#[derive(Clone)]
pub struct KernelBuilder {
    store: Arc<dyn SessionStore>,
    hub_buffer: usize,
}

impl KernelBuilder {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            hub_buffer: 1024,
        }
    }

    pub fn hub_buffer(mut self, hub_buffer: usize) -> Self {
        self.hub_buffer = hub_buffer;
        self
    }

    pub fn build(self) -> AtelierKernel {
        AtelierKernel {
            inner: Arc::new(KernelInner {
                store: self.store,
                hub: SessionHub::new(self.hub_buffer),
                locks: Mutex::new(HashMap::new()),
            }),
        }
    }
}

/// Result of applying one inbound protocol message.
#[derive(Debug)]
pub struct Applied {
    pub replies: Vec<ServerMessage>,
    pub disposition: Disposition,
}

/// The session-sync runtime facade. Cheap to clone; all clones share one
/// store, hub, and lock registry.
#[derive(Clone)]
pub struct AtelierKernel {
    inner: Arc<KernelInner>,
}

struct KernelInner {
    store: Arc<dyn SessionStore>,
    hub: SessionHub,
    // Writers for one session id serialize through a per-id async mutex held
    // across the whole read-modify-write, so a concurrent connection can
    // never make a save silently discard another's update.
    locks: Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>>,
}

impl AtelierKernel {
    fn lock_for(&self, id: &SessionId) -> Arc<tokio::sync::Mutex<()>> {
        let mut guard = self.inner.locks.lock();
        guard
            .entry(id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Create a fresh empty session, minting an id unless one is supplied.
    #[instrument(skip(self, id))]
    pub async fn create_session(&self, id: Option<SessionId>) -> Result<Session> {
        let id = id.unwrap_or_else(SessionId::new_uuid);
        let lock = self.lock_for(&id);
        let _guard = lock.lock().await;

        let session = Session::new(id, Self::now_ms());
        self.inner.store.create(&session).await?;
        info!(session_id = %session.id, "session created");
        Ok(session)
    }

    /// Get-or-create, used when a sync connection binds to an id.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn open_session(&self, id: &SessionId) -> Result<Session> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        if let Some(existing) = self.inner.store.get(id).await? {
            debug!("existing session bound");
            return Ok(existing);
        }

        let session = Session::new(id.clone(), Self::now_ms());
        self.inner.store.create(&session).await?;
        info!("new session created on connect");
        Ok(session)
    }

    pub async fn session(&self, id: &SessionId) -> Result<Option<Session>> {
        self.inner.store.get(id).await
    }

    /// Apply one inbound protocol message to the bound session.
    ///
    /// The mutation is computed fully against the current snapshot and then
    /// written back as one whole-record save; a failure anywhere leaves the
    /// stored record untouched.
    #[instrument(skip(self, message), fields(session_id = %id))]
    pub async fn apply(&self, id: &SessionId, message: ClientMessage) -> Result<Applied> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut session = self
            .inner
            .store
            .get(id)
            .await?
            .ok_or_else(|| SyncError::SessionNotFound(id.to_string()))?;

        let approvals_before = session.approvals.len();
        let outcome = router::route(&mut session, message, Self::now_ms())?;

        if outcome.mutated {
            self.inner.store.save(&session).await?;
            for approval in &session.approvals[approvals_before..] {
                self.inner.hub.publish(SessionEvent {
                    session_id: id.clone(),
                    kind: SessionEventKind::ApprovalAppended(approval.clone()),
                });
            }
        }

        Ok(Applied {
            replies: outcome.replies,
            disposition: outcome.disposition,
        })
    }

    /// Append a transcript turn (external transcript source feed).
    #[instrument(skip(self, turn), fields(session_id = %id))]
    pub async fn append_turn(&self, id: &SessionId, turn: ChatTurn) -> Result<()> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut session = self
            .inner
            .store
            .get(id)
            .await?
            .ok_or_else(|| SyncError::SessionNotFound(id.to_string()))?;
        session.messages.push(turn);
        self.inner.store.save(&session).await?;
        Ok(())
    }

    /// Replace the to-do list (produced once the brief is considered
    /// complete).
    #[instrument(skip(self, todos), fields(session_id = %id))]
    pub async fn replace_todos(&self, id: &SessionId, todos: Vec<TodoItem>) -> Result<()> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut session = self
            .inner
            .store
            .get(id)
            .await?
            .ok_or_else(|| SyncError::SessionNotFound(id.to_string()))?;
        session.todos = todos;
        self.inner.store.save(&session).await?;
        Ok(())
    }

    /// Push a structured prompt to the session's connected clients.
    #[instrument(skip(self, prompt), fields(session_id = %id, prompt_id = %prompt.prompt_id))]
    pub async fn push_prompt(&self, id: &SessionId, prompt: UiPrompt) -> Result<()> {
        if self.inner.store.get(id).await?.is_none() {
            return Err(SyncError::SessionNotFound(id.to_string()).into());
        }

        self.inner.hub.publish(SessionEvent {
            session_id: id.clone(),
            kind: SessionEventKind::Outbound(prompt.into()),
        });
        Ok(())
    }

    /// The session's approval ledger (dashboard read).
    pub async fn approvals(&self, id: &SessionId) -> Result<Vec<Approval>> {
        let session = self
            .inner
            .store
            .get(id)
            .await?
            .ok_or_else(|| SyncError::SessionNotFound(id.to_string()))?;
        Ok(session.approvals)
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.inner.hub.subscribe()
    }
}
