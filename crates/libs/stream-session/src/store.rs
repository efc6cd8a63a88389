//! Concurrency-safe session store
//!
//! The single source of truth for what is currently streaming. Callers never
//! see the underlying map; they get owned copies of its entries.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::SessionError;
use crate::session::{SessionId, SessionRecord};

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<SessionRecord>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record; an id can only be inserted once
    pub async fn insert(&self, record: SessionRecord) -> Result<Arc<SessionRecord>, SessionError> {
        let mut sessions = self.sessions.write().await;
        let id = record.id();
        if sessions.contains_key(&id) {
            return Err(SessionError::AlreadyExists(id));
        }
        let record = Arc::new(record);
        sessions.insert(id, record.clone());
        Ok(record)
    }

    pub async fn get(&self, id: &SessionId) -> Result<Arc<SessionRecord>, SessionError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(SessionError::NotFound(*id))
    }

    /// Remove a record; removing an absent id is a no-op
    pub async fn remove(&self, id: &SessionId) -> Option<Arc<SessionRecord>> {
        self.sessions.write().await.remove(id)
    }

    /// Copy of the current entries
    ///
    /// Later inserts and removals do not affect the returned list.
    pub async fn snapshot(&self) -> Vec<Arc<SessionRecord>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Remove and return every record
    pub async fn drain(&self) -> Vec<Arc<SessionRecord>> {
        self.sessions.write().await.drain().map(|(_, r)| r).collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::StreamConfig;
    use crate::credentials::StreamKey;
    use crate::launcher::EncoderProcess;
    use tokio::process::Command;

    fn record(id: SessionId) -> SessionRecord {
        let child = Command::new("sleep").arg("30").kill_on_drop(true).spawn().unwrap();
        let process = EncoderProcess::from_child(child).unwrap();
        SessionRecord::new(id, StreamKey::new("k"), StreamConfig::default(), process)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = SessionStore::new();
        let id = SessionId::generate();
        store.insert(record(id)).await.unwrap();

        let found = store.get(&id).await.unwrap();
        assert_eq!(found.id(), id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() {
        let store = SessionStore::new();
        let id = SessionId::generate();
        store.insert(record(id)).await.unwrap();

        match store.insert(record(id)).await {
            Err(SessionError::AlreadyExists(dup)) => assert_eq!(dup, id),
            other => panic!("Expected AlreadyExists, got {:?}", other),
        }
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let store = SessionStore::new();
        let id = SessionId::generate();
        assert!(matches!(
            store.get(&id).await,
            Err(SessionError::NotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = SessionStore::new();
        let id = SessionId::generate();
        store.insert(record(id)).await.unwrap();

        assert!(store.remove(&id).await.is_some());
        assert!(store.remove(&id).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_is_detached_from_store() {
        let store = SessionStore::new();
        let first = SessionId::generate();
        store.insert(record(first)).await.unwrap();

        let snapshot = store.snapshot().await;
        store.remove(&first).await;
        store.insert(record(SessionId::generate())).await.unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), first);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_do_not_collide() {
        let store = Arc::new(SessionStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let id = SessionId::generate();
                store.insert(record(id)).await.map(|_| id)
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap());
        }
        ids.sort_by_key(|id| id.to_string());
        ids.dedup();

        assert_eq!(ids.len(), 16);
        assert_eq!(store.len().await, 16);
        assert_eq!(store.drain().await.len(), 16);
        assert!(store.is_empty().await);
    }
}
