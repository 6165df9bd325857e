use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Scoped key-value slot used to carry rejected form input to the next page.
pub trait DataPersistor: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
    fn clear(&self, key: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
}

#[derive(Default)]
struct SessionState {
    staged: HashMap<String, Value>,
    messages: Vec<Message>,
}

impl SessionState {
    fn is_empty(&self) -> bool {
        self.staged.is_empty() && self.messages.is_empty()
    }
}

/// Per-session state for every admin signed in to this process.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(self: &Arc<Self>, id: impl Into<String>) -> Session {
        Session {
            id: id.into(),
            store: self.clone(),
        }
    }

    /// Sessions currently holding staged data or undelivered messages.
    pub fn active_sessions(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionState>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to one session's staging area and message queue.
#[derive(Clone)]
pub struct Session {
    id: String,
    store: Arc<SessionStore>,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    // Empty states are dropped so the store only holds sessions with pending data.
    fn with_state<T>(&self, f: impl FnOnce(&mut SessionState) -> T) -> T {
        let mut sessions = self.store.lock();
        let state = sessions.entry(self.id.clone()).or_default();
        let result = f(state);
        if state.is_empty() {
            sessions.remove(&self.id);
        }
        result
    }

    fn read_state<T>(&self, f: impl FnOnce(&SessionState) -> Option<T>) -> Option<T> {
        self.store.lock().get(&self.id).and_then(f)
    }

    pub fn add_success_message(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::debug!("Session {}: success message: {}", self.id, text);
        self.with_state(|state| {
            state.messages.push(Message {
                kind: MessageKind::Success,
                text,
            })
        });
    }

    pub fn add_error_message(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::debug!("Session {}: error message: {}", self.id, text);
        self.with_state(|state| {
            state.messages.push(Message {
                kind: MessageKind::Error,
                text,
            })
        });
    }

    /// Drains pending messages; called when a page is rendered.
    pub fn take_messages(&self) -> Vec<Message> {
        if self.read_state(|state| Some(state.messages.is_empty())).unwrap_or(true) {
            return Vec::new();
        }
        self.with_state(|state| std::mem::take(&mut state.messages))
    }
}

impl DataPersistor for Session {
    fn get(&self, key: &str) -> Option<Value> {
        self.read_state(|state| state.staged.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) {
        self.with_state(|state| {
            state.staged.insert(key.to_string(), value);
        });
    }

    fn clear(&self, key: &str) {
        if self.read_state(|state| Some(state.staged.contains_key(key))) != Some(true) {
            return;
        }
        self.with_state(|state| {
            state.staged.remove(key);
        });
    }
}
