use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::orchestrator::ConversationState;

/// Keyed persistence for conversation state. The backing format is the
/// store's choice; whatever it is must round-trip a `ConversationState`
/// losslessly (message order and role tags preserved).
///
/// Reads and writes to distinct keys are safe concurrently. Concurrent
/// writes to the same key are not expected (one user, one active turn) and
/// resolve last-write-wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &Uuid) -> anyhow::Result<Option<ConversationState>>;
    async fn put(&self, state: &ConversationState) -> anyhow::Result<()>;
}

/// Process-local store used by the default server wiring and in tests.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, ConversationState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        MemorySessionStore::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &Uuid) -> anyhow::Result<Option<ConversationState>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn put(&self, state: &ConversationState) -> anyhow::Result<()> {
        self.sessions.write().await.insert(state.id, state.clone());
        Ok(())
    }
}

/// Durable store: one JSON file per conversation under a directory.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(FileSessionStore { dir })
    }

    fn path_for(&self, id: &Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, id: &Uuid) -> anyhow::Result<Option<ConversationState>> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn put(&self, state: &ConversationState) -> anyhow::Result<()> {
        let path = self.path_for(&state.id);
        let content = serde_json::to_string(state)?;
        tokio::fs::write(&path, content).await?;
        Ok(())
    }
}
