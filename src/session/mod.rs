//! Session state store
//!
//! Keeps a bounded window of recent turns per session id so that follow-up
//! questions can reference what was just discussed, even when the router
//! switches handlers between turns.
//!
//! Each session sits behind its own async mutex. A turn holds the session's
//! lock from the moment its history is read until the new turn is recorded,
//! so concurrent requests for the same id are serialised while different
//! sessions proceed independently. A turn that ends without recording
//! anything leaves no slot behind.

use crate::models::{HandlerCategory, RoutedResponse, SessionSummary};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

pub const MAX_HISTORY: usize = 5;
pub const MAX_TOPICS: usize = 3;

/// One completed query/response exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionTurn {
    pub query: String,
    pub response: String,
    pub handler: HandlerCategory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    history: VecDeque<SessionTurn>,
    last_handler: Option<HandlerCategory>,
    last_topics: VecDeque<String>,
}

impl SessionState {
    pub fn history(&self) -> impl DoubleEndedIterator<Item = &SessionTurn> {
        self.history.iter()
    }

    pub fn last_turn(&self) -> Option<&SessionTurn> {
        self.history.back()
    }

    pub fn last_handler(&self) -> Option<HandlerCategory> {
        self.last_handler
    }

    pub fn last_topics(&self) -> impl Iterator<Item = &String> {
        self.last_topics.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Append a turn, evicting the oldest entries past the bounds.
    pub fn record(&mut self, query: &str, response: &RoutedResponse, handler: HandlerCategory) {
        self.history.push_back(SessionTurn {
            query: query.to_string(),
            response: response.response.clone(),
            handler,
        });
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }

        self.last_handler = Some(handler);

        if let Some(action) = &response.metadata.suggested_action {
            self.last_topics.push_back(action.clone());
            while self.last_topics.len() > MAX_TOPICS {
                self.last_topics.pop_front();
            }
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let handlers: BTreeSet<&'static str> =
            self.history.iter().map(|turn| turn.handler.as_str()).collect();

        SessionSummary {
            interaction_count: self.history.len(),
            handlers_used: handlers.into_iter().map(str::to_string).collect(),
            recent_topics: self.last_topics.iter().cloned().collect(),
        }
    }
}

/// `None` until the first turn is recorded, so reads never create state.
type SessionSlot = Arc<Mutex<Option<SessionState>>>;
type SessionMap = Arc<RwLock<HashMap<String, SessionSlot>>>;

/// Exclusive access to one session for the duration of a turn.
pub struct SessionGuard {
    guard: OwnedMutexGuard<Option<SessionState>>,
    sessions: SessionMap,
    session_id: String,
}

impl SessionGuard {
    /// Current state, or a fresh empty one for a new session.
    pub fn state(&self) -> SessionState {
        self.guard.as_ref().cloned().unwrap_or_default()
    }

    pub fn record(&mut self, query: &str, response: &RoutedResponse, handler: HandlerCategory) {
        self.guard
            .get_or_insert_with(SessionState::default)
            .record(query, response, handler);
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.guard.is_some() {
            return;
        }

        // skipped while the map is busy; the next empty release retries
        let Ok(mut sessions) = self.sessions.try_write() else {
            return;
        };

        let slot = OwnedMutexGuard::mutex(&self.guard);
        // the map and this guard are the only holders, so nobody is waiting
        let unused = Arc::strong_count(slot) <= 2
            && sessions
                .get(&self.session_id)
                .is_some_and(|current| Arc::ptr_eq(current, slot));

        if unused {
            sessions.remove(&self.session_id);
            debug!(session_id = %self.session_id, "Released empty session slot");
        }
    }
}

#[derive(Default)]
pub struct SessionStore {
    sessions: SessionMap,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, session_id: &str) -> SessionSlot {
        {
            let sessions = self.sessions.read().await;
            if let Some(slot) = sessions.get(session_id) {
                return slot.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Lock a session for a whole turn. `None` session id means stateless.
    pub async fn acquire(&self, session_id: Option<&str>) -> Option<SessionGuard> {
        let session_id = session_id?;
        let slot = self.slot(session_id).await;
        let guard = slot.lock_owned().await;
        debug!(session_id = %session_id, "Session lock acquired");
        Some(SessionGuard {
            guard,
            sessions: self.sessions.clone(),
            session_id: session_id.to_string(),
        })
    }

    /// Existing state or an empty one. Nothing is persisted by this call.
    pub async fn get_or_create(&self, session_id: Option<&str>) -> SessionState {
        let Some(session_id) = session_id else {
            return SessionState::default();
        };

        let slot = {
            let sessions = self.sessions.read().await;
            sessions.get(session_id).cloned()
        };

        let Some(slot) = slot else {
            return SessionState::default();
        };

        let state = slot.lock().await;
        state.as_ref().cloned().unwrap_or_default()
    }

    /// Record a turn atomically. No-op without a session id.
    pub async fn update(
        &self,
        session_id: Option<&str>,
        query: &str,
        response: &RoutedResponse,
        handler: HandlerCategory,
    ) {
        if let Some(mut guard) = self.acquire(session_id).await {
            guard.record(query, response, handler);
        }
    }

    pub async fn summary(&self, session_id: &str) -> Option<SessionSummary> {
        let slot = {
            let sessions = self.sessions.read().await;
            sessions.get(session_id).cloned()?
        };

        let state = slot.lock().await;
        state.as_ref().map(SessionState::summary)
    }
}
