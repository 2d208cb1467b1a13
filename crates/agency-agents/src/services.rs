//! Session and memory stores shared by every pipeline run in the process.
//!
//! Both are constructed once at startup and handed to the executor, so
//! conversational state and memory persist across turns.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use agency_models::SessionsConfig;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionEvent {
    pub author: String,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Conversation state for one session id.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    /// Agent outputs keyed by `output_key`.
    pub state: Map<String, Value>,
    pub events: Vec<SessionEvent>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            state: Map::new(),
            events: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn push_event(&mut self, author: &str, text: &str) {
        self.events.push(SessionEvent {
            author: author.to_string(),
            text: text.to_string(),
            at: Utc::now(),
        });
    }
}

pub type SharedSession = Arc<RwLock<Session>>;

/// In-memory session store. Idle sessions are evicted.
pub struct SessionService {
    inner: Cache<String, SharedSession>,
}

impl SessionService {
    pub fn new(max_sessions: u64, idle_timeout: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_sessions)
                .time_to_idle(idle_timeout)
                .build(),
        }
    }

    pub fn from_config(config: &SessionsConfig) -> Self {
        Self::new(
            config.max_sessions,
            Duration::from_secs(config.idle_timeout_seconds),
        )
    }

    pub async fn get_or_create(&self, id: &str) -> SharedSession {
        self.inner
            .get_with(id.to_string(), async { Arc::new(RwLock::new(Session::new(id))) })
            .await
    }

    pub async fn get(&self, id: &str) -> Option<SharedSession> {
        self.inner.get(id).await
    }

    pub async fn delete(&self, id: &str) {
        self.inner.invalidate(id).await;
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MemoryEntry {
    pub session_id: String,
    pub author: String,
    pub text: String,
    pub at: DateTime<Utc>,
}

pub const DEFAULT_MAX_MEMORY_ENTRIES: usize = 10_000;

/// Long-term memory: events of finished sessions, searchable by keyword.
///
/// Holds at most `max_entries` events; the oldest are dropped first.
/// Entries outlive the session they came from.
pub struct MemoryService {
    entries: RwLock<VecDeque<MemoryEntry>>,
    max_entries: usize,
}

impl Default for MemoryService {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_MEMORY_ENTRIES)
    }
}

impl MemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            max_entries,
        }
    }

    /// Store the session's events. Events already stored for this session
    /// are replaced, so a session can be added after every turn.
    pub async fn add_session_to_memory(&self, session: &Session) {
        let mut entries = self.entries.write().await;
        entries.retain(|entry| entry.session_id != session.id);
        entries.extend(session.events.iter().map(|event| MemoryEntry {
            session_id: session.id.clone(),
            author: event.author.clone(),
            text: event.text.clone(),
            at: event.at,
        }));
        let excess = entries.len().saturating_sub(self.max_entries);
        if excess > 0 {
            entries.drain(..excess);
            debug!(dropped = excess, "Memory full, dropped oldest entries");
        }
    }

    /// Entries sharing at least one word with `query`, case-insensitive.
    pub async fn search(&self, query: &str) -> Vec<MemoryEntry> {
        let wanted = words(query);
        if wanted.is_empty() {
            return Vec::new();
        }
        self.entries
            .read()
            .await
            .iter()
            .filter(|entry| !words(&entry.text).is_disjoint(&wanted))
            .cloned()
            .collect()
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Process-lifetime services passed explicitly into the executor.
#[derive(Clone)]
pub struct Services {
    pub sessions: Arc<SessionService>,
    pub memory: Arc<MemoryService>,
}

impl Services {
    pub fn new(sessions: SessionService, memory: MemoryService) -> Self {
        Self {
            sessions: Arc::new(sessions),
            memory: Arc::new(memory),
        }
    }

    pub fn from_config(config: &SessionsConfig) -> Self {
        Self::new(
            SessionService::from_config(config),
            MemoryService::with_capacity(config.max_memory_entries),
        )
    }
}
