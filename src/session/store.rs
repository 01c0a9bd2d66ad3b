//! Session records and the in-memory session store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::mcp::error::McpError;

/// Default session time-to-live (30 minutes).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Snapshot of a session.
///
/// Values handed out by the store are copies; the authoritative record stays
/// inside [`SessionStore`] and only changes through its methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub state: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn new(id: String, state: Map<String, Value>, ttl: TimeDelta) -> Self {
        let now = Utc::now();
        Self {
            id,
            state,
            created_at: now,
            last_accessed_at: now,
            expires_at: expiry(now, ttl),
        }
    }

    /// Check whether the session has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    fn touch(&mut self, ttl: TimeDelta) {
        let now = Utc::now();
        self.last_accessed_at = now;
        self.expires_at = expiry(now, ttl);
    }
}

// Saturates instead of overflowing for very long TTLs.
fn expiry(now: DateTime<Utc>, ttl: TimeDelta) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

type SessionEntry = Arc<Mutex<Session>>;

/// Thread-safe store for sessions.
///
/// Each record sits behind its own mutex, taken while the map lock is held.
/// Touches and state updates of one session are therefore serialized, and the
/// sweeper (which holds the map write lock) never interleaves with them.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

#[derive(Debug)]
struct SessionStoreInner {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    ttl: TimeDelta,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    /// Create a new session store whose sessions live for `ttl` after their
    /// last access.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                sessions: RwLock::new(HashMap::new()),
                ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            }),
        }
    }

    /// Create a new session and return it.
    pub fn create_session(&self, initial_state: Map<String, Value>) -> Session {
        let id = Uuid::new_v4().to_string();
        let session = Session::new(id.clone(), initial_state, self.inner.ttl);
        self.write_sessions()
            .insert(id, Arc::new(Mutex::new(session.clone())));
        debug!(name: "session.created", session_id = %session.id, "Session created");
        session
    }

    /// Get an unexpired session by ID without refreshing it.
    #[must_use]
    pub fn get_session(&self, id: &str) -> Option<Session> {
        let sessions = self.read_sessions();
        let entry = sessions.get(id)?;
        let session = lock(entry);
        (!session.is_expired_at(Utc::now())).then(|| session.clone())
    }

    /// Refresh `lastAccessedAt` and push back the expiry. Returns `false` when
    /// the session is absent or already expired.
    pub fn touch(&self, id: &str) -> bool {
        self.get_and_touch(id).is_some()
    }

    /// Look up an unexpired session and refresh it in one step.
    pub fn get_and_touch(&self, id: &str) -> Option<Session> {
        let sessions = self.read_sessions();
        let entry = sessions.get(id)?;
        let mut session = lock(entry);
        if session.is_expired_at(Utc::now()) {
            return None;
        }
        session.touch(self.inner.ttl);
        Some(session.clone())
    }

    /// Shallow-merge `patch` into the session state (last write wins per key).
    pub fn update_state(&self, id: &str, patch: Map<String, Value>) -> Result<Session, McpError> {
        let sessions = self.read_sessions();
        let entry = sessions
            .get(id)
            .ok_or_else(|| McpError::not_found(format!("Session not found: {id}")))?;
        let mut session = lock(entry);
        if session.is_expired_at(Utc::now()) {
            return Err(McpError::not_found(format!("Session expired: {id}")));
        }
        session.state.extend(patch);
        session.touch(self.inner.ttl);
        Ok(session.clone())
    }

    /// Remove a session by ID.
    pub fn delete(&self, id: &str) -> bool {
        self.write_sessions().remove(id).is_some()
    }

    /// Number of stored sessions, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_sessions().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every session expired at this instant.
    ///
    /// Returns the number of sessions removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    /// Remove every session expired at `now`.
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.write_sessions();
        let before = sessions.len();
        sessions.retain(|_, entry| !lock(entry).is_expired_at(now));
        let removed = before - sessions.len();
        if removed > 0 {
            metrics::counter!("sessions_expired_total").increment(removed as u64);
        }
        removed
    }

    /// Spawn the periodic expiry sweep. The task stops when `cancel` fires.
    pub fn spawn_sweeper(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = store.sweep_expired();
                        if removed > 0 {
                            info!(
                                name: "session.sweep",
                                removed,
                                remaining = store.len(),
                                "Expired sessions removed"
                            );
                        }
                    }
                }
            }
            debug!(name: "session.sweeper.stopped", "Session sweeper stopped");
        })
    }

    fn read_sessions(&self) -> RwLockReadGuard<'_, HashMap<String, SessionEntry>> {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_sessions(&self) -> RwLockWriteGuard<'_, HashMap<String, SessionEntry>> {
        self.inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock(entry: &SessionEntry) -> MutexGuard<'_, Session> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}
