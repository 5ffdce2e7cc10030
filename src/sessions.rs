use crate::worksheet::Worksheet;
use parking_lot::RwLock;
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub const MAX_SESSION_COUNT: usize = 4096;
pub const SESSION_ID_LEN: usize = 24;

/// Worksheets keyed by session id. Every mutation runs under one write guard.
#[derive(Clone)]
pub struct SessionStore {
    shared: Arc<SessionShared>,
}

struct SessionShared {
    inner: RwLock<SessionData>,
    capacity: usize,
}

#[derive(Default)]
struct SessionData {
    sessions: HashMap<String, SessionSlot>,
    clock: u64,
}

struct SessionSlot {
    worksheet: Worksheet,
    last_seen: u64,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_capacity(MAX_SESSION_COUNT)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                inner: RwLock::new(SessionData::default()),
                capacity: capacity.max(1),
            }),
        }
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.shared.inner.read().sessions.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.shared.inner.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the session's worksheet, or an empty one for unknown ids.
    pub fn snapshot(&self, session_id: &str) -> Worksheet {
        self.shared
            .inner
            .read()
            .sessions
            .get(session_id)
            .map(|slot| slot.worksheet.clone())
            .unwrap_or_default()
    }

    /// Runs `f` against the session's worksheet, creating it on first use.
    pub fn with_worksheet<R>(&self, session_id: &str, f: impl FnOnce(&mut Worksheet) -> R) -> R {
        let mut guard = self.shared.inner.write();
        guard.clock = guard.clock.saturating_add(1);
        let now = guard.clock;

        if guard.sessions.len() >= self.shared.capacity && !guard.sessions.contains_key(session_id)
        {
            if let Some(oldest) = oldest_session_key(&guard.sessions) {
                debug!(session = %oldest, "evicting least recently seen session");
                guard.sessions.remove(&oldest);
            }
        }

        let slot = guard
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionSlot {
                worksheet: Worksheet::new(),
                last_seen: now,
            });
        slot.last_seen = now;
        f(&mut slot.worksheet)
    }
}

fn oldest_session_key(sessions: &HashMap<String, SessionSlot>) -> Option<String> {
    sessions
        .iter()
        .min_by_key(|(_, slot)| slot.last_seen)
        .map(|(key, _)| key.clone())
}

pub fn generate_session_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}
