use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ServerConfig;

/// Shared state behind every handler.
pub struct AppState {
    pub config: ServerConfig,
    pub locks: CommitLocks,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            locks: CommitLocks::new(),
        }
    }
}

/// Per-trench commit locks.
///
/// A sync request holds its trench's lock across the whole protocol decision
/// (head read, attachment check, commit, head advance), so two writers
/// against the same prior head serialize and the loser observes the winner's
/// head. Locks are created on first use and live for the process lifetime;
/// the registry stays small because trenches are few.
pub struct CommitLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CommitLocks {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// The lock guarding `(project, trench)`.
    pub fn lock_for(&self, project: &str, trench: &str) -> Arc<Mutex<()>> {
        let key = format!("{project}/{trench}");
        let mut map = self.inner.lock();
        Arc::clone(map.entry(key).or_default())
    }
}

impl Default for CommitLocks {
    fn default() -> Self {
        Self::new()
    }
}
