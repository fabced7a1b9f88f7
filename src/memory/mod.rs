// src/memory/mod.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::error::SessionInUseError;

/// Key-value scratchpad for facts gathered during one resolution
/// (mediation ids, evidence, fault determinations).
pub trait Memory {
    fn put(&self, key: &str, value: Value);
    fn get(&self, key: &str) -> Option<Value>;
    fn all(&self) -> BTreeMap<String, Value>;
}

type Entries = BTreeMap<String, Value>;

/// Process-wide store partitioned by case id.
///
/// Sessions are opened when a resolution starts and released when it ends,
/// so nothing outlives the case that produced it.
#[derive(Debug, Clone, Default)]
pub struct ContextStore {
    sessions: Arc<RwLock<HashMap<String, Entries>>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_session(&self, case_id: &str) -> Result<SessionContext, SessionInUseError> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(case_id) {
            return Err(SessionInUseError {
                case_id: case_id.to_string(),
            });
        }
        sessions.insert(case_id.to_string(), Entries::new());
        debug!(case_id, "context session opened");
        Ok(SessionContext {
            case_id: case_id.to_string(),
            store: self.clone(),
            released: false,
        })
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn snapshot(&self, case_id: &str) -> Option<BTreeMap<String, Value>> {
        self.sessions.read().get(case_id).cloned()
    }

    fn release(&self, case_id: &str) -> Entries {
        let entries = self.sessions.write().remove(case_id).unwrap_or_default();
        debug!(case_id, entries = entries.len(), "context session released");
        entries
    }
}

/// Handle to one case's entries. Dropping it releases them.
#[derive(Debug)]
pub struct SessionContext {
    case_id: String,
    store: ContextStore,
    released: bool,
}

impl SessionContext {
    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    /// Ends the session and hands back whatever it held.
    pub fn close(mut self) -> BTreeMap<String, Value> {
        self.released = true;
        self.store.release(&self.case_id)
    }
}

impl Memory for SessionContext {
    fn put(&self, key: &str, value: Value) {
        let mut sessions = self.store.sessions.write();
        if let Some(entries) = sessions.get_mut(&self.case_id) {
            entries.insert(key.to_string(), value);
        }
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.store
            .sessions
            .read()
            .get(&self.case_id)
            .and_then(|entries| entries.get(key).cloned())
    }

    fn all(&self) -> BTreeMap<String, Value> {
        self.store.snapshot(&self.case_id).unwrap_or_default()
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        if !self.released {
            self.store.release(&self.case_id);
        }
    }
}
