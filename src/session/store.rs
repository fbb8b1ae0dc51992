// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session store
//!
//! Keyed, append-only conversation history. A turn takes the session's lock
//! before loading and keeps it until its messages are appended, so turns on
//! one session run strictly one after another (tokio's mutex is FIFO), while
//! different sessions never contend.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::error::Result;
use crate::llm::message::Message;

/// Exclusive right to run a turn on one session. Released on drop.
pub struct SessionLock {
    session_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl SessionLock {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl std::fmt::Debug for SessionLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLock")
            .field("session_id", &self.session_id)
            .finish()
    }
}

/// Storage for per-session message history
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Wait for exclusive access to `session_id`
    async fn lock(&self, session_id: &str) -> SessionLock;

    /// Ordered history; empty for an unseen session
    async fn load(&self, session_id: &str) -> Result<Vec<Message>>;

    /// Append messages in order, all at once
    async fn append(&self, session_id: &str, messages: Vec<Message>) -> Result<()>;
}

/// Process-lifetime store, lost on restart
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Vec<Message>>>>,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions with at least one stored message
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Number of session locks currently held or awaited
    pub async fn active_lock_count(&self) -> usize {
        let mut locks = self.locks.lock().await;
        prune_idle(&mut locks);
        locks.len()
    }
}

/// Drop lock entries nobody holds or waits on. Holders and waiters keep a
/// clone of the `Arc`, so a count of one means the entry is idle.
fn prune_idle(locks: &mut HashMap<String, Arc<Mutex<()>>>) {
    locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn lock(&self, session_id: &str) -> SessionLock {
        let session_mutex = {
            let mut locks = self.locks.lock().await;
            prune_idle(&mut locks);
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        SessionLock {
            session_id: session_id.to_string(),
            _guard: session_mutex.lock_owned().await,
        }
    }

    async fn load(&self, session_id: &str) -> Result<Vec<Message>> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append(&self, session_id: &str, messages: Vec<Message>) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_default()
            .extend(messages);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unseen_session_is_empty() {
        let store = InMemorySessionStore::new();
        assert!(store.load("nobody").await.unwrap().is_empty());
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = InMemorySessionStore::new();
        store
            .append("s1", vec![Message::user("a"), Message::assistant("b")])
            .await
            .unwrap();
        store.append("s1", vec![Message::user("c")]).await.unwrap();

        let texts: Vec<String> = store
            .load("s1")
            .await
            .unwrap()
            .iter()
            .map(|m| m.text())
            .collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = InMemorySessionStore::new();
        store.append("s1", vec![Message::user("one")]).await.unwrap();
        store.append("s2", vec![Message::user("two")]).await.unwrap();

        assert_eq!(store.load("s1").await.unwrap().len(), 1);
        assert_eq!(store.load("s2").await.unwrap()[0].text(), "two");
    }

    #[tokio::test]
    async fn test_empty_append_does_not_create_session() {
        let store = InMemorySessionStore::new();
        store.append("s1", Vec::new()).await.unwrap();
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_lock_serializes_same_session() {
        let store = InMemorySessionStore::new();
        let held = store.lock("s1").await;
        assert_eq!(held.session_id(), "s1");

        let contender = {
            let store = store.clone();
            tokio::spawn(async move {
                let _lock = store.lock("s1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_idle_locks_are_pruned() {
        let store = InMemorySessionStore::new();
        for id in ["a", "b", "c"] {
            let _lock = store.lock(id).await;
        }
        assert_eq!(store.active_lock_count().await, 0);

        let held = store.lock("d").await;
        assert_eq!(store.active_lock_count().await, 1);
        drop(held);
        assert_eq!(store.active_lock_count().await, 0);
    }

    #[tokio::test]
    async fn test_lock_does_not_block_other_sessions() {
        let store = InMemorySessionStore::new();
        let _held = store.lock("s1").await;
        tokio::time::timeout(Duration::from_millis(200), store.lock("s2"))
            .await
            .unwrap();
    }
}
