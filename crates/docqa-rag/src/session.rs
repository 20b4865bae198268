//! Conversation sessions with per-session ordering and pluggable eviction

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::{EvictionConfig, SessionConfig};

/// One question/answer exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    /// Question as asked
    pub question: String,
    /// Generated answer
    pub answer: String,
    /// When the question was asked
    pub asked_at: DateTime<Utc>,
}

/// Conversation history for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    /// Session ID
    pub id: String,
    /// Turns, oldest first
    pub turns: Vec<ConversationTurn>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last time the session was used
    pub last_access: DateTime<Utc>,
}

impl ConversationSession {
    /// Create an empty session
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            turns: Vec::new(),
            created_at: now,
            last_access: now,
        }
    }

    /// Append a turn, dropping the oldest ones beyond `cap`
    pub fn push_turn(&mut self, turn: ConversationTurn, cap: Option<usize>) {
        self.last_access = Utc::now();
        self.turns.push(turn);
        if let Some(cap) = cap {
            let excess = self.turns.len().saturating_sub(cap);
            self.turns.drain(..excess);
        }
    }
}

/// Decides which sessions a sweep removes
pub trait EvictionPolicy: Send + Sync + fmt::Debug {
    /// Policy name for logging
    fn name(&self) -> &str;

    /// Pick ids to evict from `(id, last_access)` pairs
    fn select(&self, sessions: &[(String, DateTime<Utc>)], now: DateTime<Utc>) -> Vec<String>;
}

/// Keep sessions until explicitly removed
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEviction;

impl EvictionPolicy for NoEviction {
    fn name(&self) -> &str {
        "none"
    }

    fn select(&self, _sessions: &[(String, DateTime<Utc>)], _now: DateTime<Utc>) -> Vec<String> {
        Vec::new()
    }
}

/// Evict sessions idle for longer than the given duration
#[derive(Debug, Clone, Copy)]
pub struct IdleTimeout(pub Duration);

impl EvictionPolicy for IdleTimeout {
    fn name(&self) -> &str {
        "idle_timeout"
    }

    fn select(&self, sessions: &[(String, DateTime<Utc>)], now: DateTime<Utc>) -> Vec<String> {
        let max_idle = chrono::Duration::from_std(self.0).unwrap_or_else(|_| chrono::Duration::days(36_500));
        sessions
            .iter()
            .filter(|(_, last)| now.signed_duration_since(*last) > max_idle)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// Keep at most N sessions, evicting the least recently accessed
#[derive(Debug, Clone, Copy)]
pub struct MaxSessions(pub usize);

impl EvictionPolicy for MaxSessions {
    fn name(&self) -> &str {
        "max_sessions"
    }

    fn select(&self, sessions: &[(String, DateTime<Utc>)], _now: DateTime<Utc>) -> Vec<String> {
        if sessions.len() <= self.0 {
            return Vec::new();
        }
        let mut by_age: Vec<&(String, DateTime<Utc>)> = sessions.iter().collect();
        by_age.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        by_age
            .into_iter()
            .take(sessions.len() - self.0)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl EvictionConfig {
    /// Instantiate the configured policy
    pub fn build(&self) -> Box<dyn EvictionPolicy> {
        match *self {
            EvictionConfig::None => Box::new(NoEviction),
            EvictionConfig::IdleTimeout { idle_secs } => {
                Box::new(IdleTimeout(Duration::from_secs(idle_secs)))
            }
            EvictionConfig::MaxSessions { max_sessions } => Box::new(MaxSessions(max_sessions)),
        }
    }
}

struct SessionSlot {
    session: Arc<Mutex<ConversationSession>>,
    last_access: DateTime<Utc>,
}

/// Concurrent session registry.
///
/// Each session sits behind its own FIFO-fair async mutex, so requests on the
/// same session are served in arrival order while different sessions proceed
/// independently.
pub struct SessionStore {
    sessions: DashMap<String, SessionSlot>,
    policy: Box<dyn EvictionPolicy>,
    max_stored_turns: Option<usize>,
}

impl SessionStore {
    /// Create a store from configuration
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_policy(config.eviction.build(), config.max_stored_turns)
    }

    /// Create a store with an explicit eviction policy
    pub fn with_policy(policy: Box<dyn EvictionPolicy>, max_stored_turns: Option<usize>) -> Self {
        Self {
            sessions: DashMap::new(),
            policy,
            max_stored_turns,
        }
    }

    /// Active eviction policy
    pub fn policy(&self) -> &dyn EvictionPolicy {
        self.policy.as_ref()
    }

    /// Per-session turn cap
    pub fn max_stored_turns(&self) -> Option<usize> {
        self.max_stored_turns
    }

    /// Get or create the session and mark it used
    pub fn acquire(&self, id: &str) -> Arc<Mutex<ConversationSession>> {
        let now = Utc::now();
        let mut slot = self.sessions.entry(id.to_string()).or_insert_with(|| {
            tracing::debug!("Created session {}", id);
            SessionSlot {
                session: Arc::new(Mutex::new(ConversationSession::new(id))),
                last_access: now,
            }
        });
        slot.last_access = now;
        Arc::clone(&slot.session)
    }

    /// Snapshot of a session
    pub async fn get(&self, id: &str) -> Option<ConversationSession> {
        let session = self.sessions.get(id).map(|slot| Arc::clone(&slot.session))?;
        let guard = session.lock().await;
        Some(guard.clone())
    }

    /// Remove a session, returning whether it existed
    pub fn remove(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Drop a session that holds no turns and is not in use elsewhere.
    /// Returns whether it was removed.
    pub fn release_if_empty(&self, id: &str) -> bool {
        self.sessions
            .remove_if(id, |_, slot| {
                Arc::strong_count(&slot.session) == 1
                    && slot
                        .session
                        .try_lock()
                        .map(|session| session.turns.is_empty())
                        .unwrap_or(false)
            })
            .is_some()
    }

    /// Number of sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether there are no sessions
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Apply the eviction policy. Sessions with a request in flight are kept.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let snapshot: Vec<(String, DateTime<Utc>)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().last_access))
            .collect();

        let mut evicted = 0;
        for id in self.policy.select(&snapshot, now) {
            let removed = self
                .sessions
                .remove_if(&id, |_, slot| Arc::strong_count(&slot.session) == 1)
                .is_some();
            if removed {
                evicted += 1;
            }
        }

        if evicted > 0 {
            tracing::info!("Evicted {} sessions ({})", evicted, self.policy.name());
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(q: &str) -> ConversationTurn {
        ConversationTurn {
            question: q.to_string(),
            answer: format!("answer to {q}"),
            asked_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_acquire_creates_once() {
        let store = SessionStore::with_policy(Box::new(NoEviction), None);
        let a = store.acquire("s1");
        a.lock().await.push_turn(turn("q1"), None);

        let b = store.acquire("s1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("s1").await.unwrap().turns.len(), 1);
        assert!(store.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_remove() {
        let store = SessionStore::with_policy(Box::new(NoEviction), None);
        store.acquire("s1");
        assert!(store.remove("s1"));
        assert!(!store.remove("s1"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_release_if_empty() {
        let store = SessionStore::with_policy(Box::new(NoEviction), None);
        drop(store.acquire("blank"));
        store.acquire("used").lock().await.push_turn(turn("q1"), None);
        let held = store.acquire("busy");

        assert!(store.release_if_empty("blank"));
        assert!(!store.release_if_empty("blank"));
        assert!(!store.release_if_empty("used"));
        assert!(!store.release_if_empty("busy"));
        assert_eq!(store.len(), 2);

        drop(held);
        assert!(store.release_if_empty("busy"));
        assert_eq!(store.get("used").await.unwrap().turns.len(), 1);
    }

    #[test]
    fn test_turn_cap() {
        let mut session = ConversationSession::new("s");
        for i in 0..5 {
            session.push_turn(turn(&format!("q{i}")), Some(2));
        }
        let questions: Vec<_> = session.turns.iter().map(|t| t.question.as_str()).collect();
        assert_eq!(questions, vec!["q3", "q4"]);
    }

    #[test]
    fn test_no_eviction_keeps_everything() {
        let store = SessionStore::with_policy(Box::new(NoEviction), None);
        for i in 0..10 {
            drop(store.acquire(&format!("s{i}")));
        }
        assert_eq!(store.evict_expired(Utc::now() + chrono::Duration::days(365)), 0);
        assert_eq!(store.len(), 10);
    }

    #[test]
    fn test_idle_timeout() {
        let store = SessionStore::with_policy(Box::new(IdleTimeout(Duration::from_secs(60))), None);
        drop(store.acquire("old"));
        drop(store.acquire("fresh"));

        assert_eq!(store.evict_expired(Utc::now()), 0);
        assert_eq!(store.evict_expired(Utc::now() + chrono::Duration::seconds(120)), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_idle_timeout_spares_in_flight_sessions() {
        let store = SessionStore::with_policy(Box::new(IdleTimeout(Duration::from_secs(1))), None);
        let held = store.acquire("busy");
        drop(store.acquire("idle"));

        assert_eq!(store.evict_expired(Utc::now() + chrono::Duration::seconds(10)), 1);
        assert_eq!(store.len(), 1);
        drop(held);
    }

    #[test]
    fn test_max_sessions_evicts_least_recent() {
        let policy = MaxSessions(2);
        let now = Utc::now();
        let sessions = vec![
            ("a".to_string(), now - chrono::Duration::seconds(30)),
            ("b".to_string(), now - chrono::Duration::seconds(10)),
            ("c".to_string(), now - chrono::Duration::seconds(20)),
            ("d".to_string(), now),
        ];
        let mut evicted = policy.select(&sessions, now);
        evicted.sort();
        assert_eq!(evicted, vec!["a", "c"]);
    }

    #[test]
    fn test_policy_from_config() {
        let policy = EvictionConfig::MaxSessions { max_sessions: 3 }.build();
        assert_eq!(policy.name(), "max_sessions");
        assert_eq!(EvictionConfig::default().build().name(), "none");
    }
}
