use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use atelier_protocol::{Session, SessionId};
use parking_lot::RwLock;
use tokio::fs;
use tracing::{debug, instrument};

/// Id-keyed aggregate storage with whole-record read/write.
///
/// No partial-field update primitive exists: callers read-modify-write and
/// overwrite the whole record with [`SessionStore::save`]. `create` is not
/// idempotent — two racing creates for the same missing id each write a fresh
/// empty record and the second write wins. Serialization of writers is the
/// kernel's job, not the store's.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &SessionId) -> Result<Option<Session>>;
    async fn create(&self, session: &Session) -> Result<()>;
    async fn save(&self, session: &Session) -> Result<()>;
}

/// Map-backed store for tests and demos.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<Session>> {
        Ok(self.sessions.read().get(id).cloned())
    }

    async fn create(&self, session: &Session) -> Result<()> {
        self.save(session).await
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.sessions
            .write()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }
}

/// Durable store: one JSON document per session under `root/sessions/`.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    root: PathBuf,
}

impl FileSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn session_path(&self, id: &SessionId) -> Result<PathBuf> {
        // Ids come straight off the URL; anything path-like stays out of the
        // filesystem.
        let raw = id.as_str();
        if raw.is_empty()
            || raw == "."
            || raw == ".."
            || raw.contains('/')
            || raw.contains('\\')
        {
            bail!("refusing unsafe session id for file storage: {raw:?}");
        }
        Ok(self.root.join("sessions").join(format!("{raw}.json")))
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create sessions dir {parent:?}"))?;
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    #[instrument(skip(self), fields(session_id = %id))]
    async fn get(&self, id: &SessionId) -> Result<Option<Session>> {
        let path = self.session_path(id)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }

        let raw = fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed reading session file {path:?}"))?;
        let session = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing session file {path:?}"))?;
        Ok(Some(session))
    }

    async fn create(&self, session: &Session) -> Result<()> {
        self.save(session).await
    }

    #[instrument(skip(self, session), fields(session_id = %session.id))]
    async fn save(&self, session: &Session) -> Result<()> {
        let path = self.session_path(&session.id)?;
        Self::ensure_parent(&path).await?;

        let payload = serde_json::to_string_pretty(session)?;
        fs::write(&path, payload)
            .await
            .with_context(|| format!("failed writing session file {path:?}"))?;
        debug!("session saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use anyhow::Result;
    use atelier_protocol::{Session, SessionId};
    use tokio::fs;

    use crate::{FileSessionStore, MemorySessionStore, SessionStore};

    fn unique_test_root(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("{name}-{nanos}"))
    }

    #[tokio::test]
    async fn memory_store_reads_back_what_it_saved() -> Result<()> {
        let store = MemorySessionStore::new();
        let id = SessionId::from_string("abc123");
        assert!(store.get(&id).await?.is_none());

        let mut session = Session::new(id.clone(), 1_700_000_000_000);
        store.create(&session).await?;

        session.push_approval(1_700_000_000_500, "UI_RESPONSE style_modern -> bold");
        store.save(&session).await?;

        let loaded = store.get(&id).await?.expect("session exists");
        assert_eq!(loaded.approvals.len(), 1);
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn memory_store_create_is_last_write_wins() -> Result<()> {
        let store = MemorySessionStore::new();
        let id = SessionId::from_string("dup");

        let first = Session::new(id.clone(), 1);
        let second = Session::new(id.clone(), 2);
        store.create(&first).await?;
        store.create(&second).await?;

        let loaded = store.get(&id).await?.expect("session exists");
        assert_eq!(loaded.created_at, 2);
        Ok(())
    }

    #[tokio::test]
    async fn file_store_roundtrips_a_session_document() -> Result<()> {
        let root = unique_test_root("atelier-store-file");
        let store = FileSessionStore::new(&root);
        let id = SessionId::from_string("abc123");
        assert!(store.get(&id).await?.is_none());

        let mut session = Session::new(id.clone(), 1_700_000_000_000);
        session.brief.style = Some("bold".to_owned());
        store.create(&session).await?;

        let loaded = store.get(&id).await?.expect("session exists");
        assert_eq!(loaded, session);

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn file_store_rejects_path_like_ids() {
        let root = unique_test_root("atelier-store-unsafe");
        let store = FileSessionStore::new(&root);

        for raw in ["../escape", "a/b", "", ".."] {
            let session = Session::new(SessionId::from_string(raw), 0);
            let err = store
                .save(&session)
                .await
                .expect_err("unsafe id should be rejected");
            assert!(err.to_string().contains("unsafe session id"));
        }

        let _ = fs::remove_dir_all(root).await;
    }
}
