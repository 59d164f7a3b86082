use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use axum::http::{HeaderMap, HeaderValue};
use axum_extra::headers::{Cookie, HeaderMapExt};
use chrono::{DateTime, Duration, Utc};
use pwyc_core::session::InMemorySession;
use tracing::debug;
use uuid::Uuid;

/// Visitor sessions keyed by the id carried in the session cookie.
///
/// A session idle for longer than the configured time-to-live is dropped together
/// with the prices it carried.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<String, StoredSession>>>,
    ttl: Duration,
}

#[derive(Clone)]
struct StoredSession {
    session: InMemorySession,
    last_seen: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionHandle {
    pub id: String,
    /// The visitor carried no known session id; a cookie must be issued.
    pub is_new: bool,
}

impl SessionRegistry {
    pub fn new(ttl: StdDuration) -> Self {
        Self {
            sessions: Arc::default(),
            ttl: Duration::from_std(ttl).unwrap_or(Duration::MAX),
        }
    }

    /// Finds the visitor's session id. Unknown or expired ids are replaced by a fresh one.
    pub fn resolve(&self, headers: &HeaderMap, cookie_name: &str) -> SessionHandle {
        self.resolve_at(headers, cookie_name, Utc::now())
    }

    /// Runs `apply` against the session. The session is stored only if `apply`
    /// modified it.
    pub fn with_session<R>(&self, id: &str, apply: impl FnOnce(&mut InMemorySession) -> R) -> R {
        self.with_session_at(id, Utc::now(), apply)
    }

    pub fn snapshot(&self, id: &str) -> Option<InMemorySession> {
        let now = Utc::now();
        self.lock()
            .get(id)
            .filter(|stored| self.is_live(stored, now))
            .map(|stored| stored.session.clone())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn resolve_at(
        &self,
        headers: &HeaderMap,
        cookie_name: &str,
        now: DateTime<Utc>,
    ) -> SessionHandle {
        let presented = headers
            .typed_get::<Cookie>()
            .and_then(|cookie| cookie.get(cookie_name).map(str::to_string));

        let mut sessions = self.lock();
        self.evict_expired(&mut sessions, now);

        match presented {
            Some(id) => match sessions.get_mut(&id) {
                Some(stored) => {
                    stored.last_seen = now;
                    SessionHandle { id, is_new: false }
                }
                None => SessionHandle { id: Uuid::new_v4().to_string(), is_new: true },
            },
            None => SessionHandle { id: Uuid::new_v4().to_string(), is_new: true },
        }
    }

    fn with_session_at<R>(
        &self,
        id: &str,
        now: DateTime<Utc>,
        apply: impl FnOnce(&mut InMemorySession) -> R,
    ) -> R {
        let mut sessions = self.lock();
        let mut session = sessions
            .get(id)
            .filter(|stored| self.is_live(stored, now))
            .map(|stored| stored.session.clone())
            .unwrap_or_default();
        let result = apply(&mut session);
        if session.is_modified() {
            session.mark_saved();
            sessions.insert(id.to_string(), StoredSession { session, last_seen: now });
        }
        result
    }

    fn is_live(&self, stored: &StoredSession, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(stored.last_seen) <= self.ttl
    }

    fn evict_expired(&self, sessions: &mut HashMap<String, StoredSession>, now: DateTime<Utc>) {
        let before = sessions.len();
        sessions.retain(|_, stored| self.is_live(stored, now));
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(
                event_name = "pwyc.sessions.evicted",
                evicted,
                remaining = sessions.len(),
                "dropped idle visitor sessions"
            );
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StoredSession>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

pub fn session_cookie(cookie_name: &str, id: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{cookie_name}={id}; Path=/; HttpOnly; SameSite=Lax")).ok()
}
