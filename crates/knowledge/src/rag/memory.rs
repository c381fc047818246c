//! Conversation memory.
//!
//! Bounded per-session turn history used to resolve follow-up questions.
//! Callers hold the session lock from the history read to the turn append,
//! so turns of one session never interleave.

use super::types::Citation;
use crate::types::MemoryConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub query: String,
    pub answer: String,
    pub citations: Vec<Citation>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(query: impl Into<String>, answer: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self {
            query: query.into(),
            answer: answer.into(),
            citations,
            timestamp: Utc::now(),
        }
    }
}

/// FIFO history of one session.
#[derive(Debug)]
pub struct Session {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
    last_active: Instant,
}

impl Session {
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
            last_active: Instant::now(),
        }
    }

    /// Add a turn, evicting the oldest past capacity.
    pub fn append(&mut self, turn: ConversationTurn) {
        if self.capacity == 0 {
            return;
        }
        while self.turns.len() >= self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
        self.touch();
    }

    /// The most recent `k` turns, oldest first.
    pub fn last_n(&self, k: usize) -> Vec<ConversationTurn> {
        let skip = self.turns.len().saturating_sub(k);
        self.turns.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.touch();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }
}

/// Session storage owned by the answering pipeline.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Handle to a session, created on first use.
    async fn session(&self, session_id: &str) -> Arc<Mutex<Session>>;

    async fn append(&self, session_id: &str, turn: ConversationTurn) {
        let session = self.session(session_id).await;
        session.lock().await.append(turn);
    }

    async fn last_n(&self, session_id: &str, k: usize) -> Vec<ConversationTurn> {
        let session = self.session(session_id).await;
        let guard = session.lock().await;
        guard.last_n(k)
    }

    async fn clear(&self, session_id: &str);

    /// Drop sessions idle past their TTL. Returns how many were removed.
    async fn evict_expired(&self) -> usize;
}

/// Process-local session store.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Arc<Mutex<Session>>>>,
    capacity: usize,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            capacity: config.capacity,
            ttl: config.ttl(),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn session(&self, session_id: &str) -> Arc<Mutex<Session>> {
        let mut sessions = self.sessions.lock().await;
        let capacity = self.capacity;
        Arc::clone(
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Session::new(capacity)))),
        )
    }

    async fn clear(&self, session_id: &str) {
        let removed = self.sessions.lock().await.remove(session_id);
        if let Some(session) = removed {
            session.lock().await.clear();
            tracing::debug!(session_id, "Cleared session");
        }
    }

    async fn evict_expired(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        // A session locked by a running request is in use, not idle
        sessions.retain(|_, session| match session.try_lock() {
            Ok(guard) => guard.idle_for() < self.ttl,
            Err(_) => true,
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted idle sessions");
        }
        evicted
    }
}
