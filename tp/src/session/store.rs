//! Session persistence behind a small trait
//!
//! The engine only sees [`SessionStore`]; tests use the in-memory map and
//! the service wires the `StateManager` actor.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use tripstore::now_ms;

use crate::domain::Session;
use crate::error::PlannerResult;
use crate::state::StateManager;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &str) -> PlannerResult<Option<Session>>;

    async fn put(&self, session: Session) -> PlannerResult<()>;

    async fn delete(&self, id: &str) -> PlannerResult<bool>;

    /// Drop sessions idle for longer than `older_than`, returning their ids
    async fn expire(&self, older_than: Duration) -> PlannerResult<Vec<String>>;
}

fn cutoff(older_than: Duration) -> i64 {
    now_ms() - i64::try_from(older_than.as_millis()).unwrap_or(i64::MAX)
}

/// Process-local session map
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &str) -> PlannerResult<Option<Session>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn put(&self, session: Session) -> PlannerResult<()> {
        self.sessions.write().await.insert(session.id.clone(), session);
        Ok(())
    }

    async fn delete(&self, id: &str) -> PlannerResult<bool> {
        Ok(self.sessions.write().await.remove(id).is_some())
    }

    async fn expire(&self, older_than: Duration) -> PlannerResult<Vec<String>> {
        let cutoff = cutoff(older_than);
        let mut sessions = self.sessions.write().await;
        let expired: Vec<String> = sessions
            .values()
            .filter(|s| s.updated_at < cutoff)
            .map(|s| s.id.clone())
            .collect();
        for id in &expired {
            sessions.remove(id);
        }
        debug!(expired = expired.len(), "MemorySessionStore::expire: called");
        Ok(expired)
    }
}

#[async_trait]
impl SessionStore for StateManager {
    async fn get(&self, id: &str) -> PlannerResult<Option<Session>> {
        Ok(self.get_session(id).await?)
    }

    async fn put(&self, session: Session) -> PlannerResult<()> {
        Ok(self.put_session(session).await?)
    }

    async fn delete(&self, id: &str) -> PlannerResult<bool> {
        Ok(self.delete_session(id).await?)
    }

    async fn expire(&self, older_than: Duration) -> PlannerResult<Vec<String>> {
        Ok(self.expire_sessions(cutoff(older_than)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exercise(store: &dyn SessionStore) {
        let mut old = Session::with_id("sess-old");
        old.updated_at = now_ms() - 10_000;
        store.put(old).await.unwrap();
        store.put(Session::with_id("sess-new")).await.unwrap();

        assert!(store.get("sess-new").await.unwrap().is_some());
        let expired = store.expire(Duration::from_secs(5)).await.unwrap();
        assert_eq!(expired, vec!["sess-old".to_string()]);
        assert!(store.get("sess-old").await.unwrap().is_none());

        assert!(store.delete("sess-new").await.unwrap());
        assert!(!store.delete("sess-new").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemorySessionStore::new();
        exercise(&store).await;
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_state_manager_store() {
        let manager = StateManager::spawn_in_memory().unwrap();
        exercise(&manager).await;
    }
}
