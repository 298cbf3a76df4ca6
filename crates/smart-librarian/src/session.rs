//! Conversation history handling.
//!
//! History is normally owned by the caller and resent with every request; only
//! the trailing window reaches the model. `SessionStore` is an optional
//! server-side keeper for callers that send a session id instead.

use dashmap::DashMap;
use std::collections::VecDeque;

use crate::types::ConversationTurn;

/// The last `window` turns of `history`.
pub fn history_window(history: &[ConversationTurn], window: usize) -> &[ConversationTurn] {
    let start = history.len().saturating_sub(window);
    &history[start..]
}

pub struct SessionStore {
    sessions: DashMap<String, VecDeque<ConversationTurn>>,
    capacity: usize,
}

impl SessionStore {
    /// `capacity` bounds the turns kept per session.
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn history(&self, session_id: &str) -> Vec<ConversationTurn> {
        self.sessions
            .get(session_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Append an exchange, evicting the oldest turns past capacity.
    pub fn record(&self, session_id: &str, user: ConversationTurn, assistant: ConversationTurn) {
        let mut turns = self.sessions.entry(session_id.to_string()).or_default();
        turns.push_back(user);
        turns.push_back(assistant);
        while turns.len() > self.capacity {
            turns.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
