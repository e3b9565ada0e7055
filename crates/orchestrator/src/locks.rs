use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use dbops_restart_domain::{ServerName, TaskId};

/// A target was already held by another running task.
#[derive(Debug, thiserror::Error)]
#[error("server {server} is locked by task {holder}")]
pub struct LockConflict {
    pub server: ServerName,
    pub holder: TaskId,
}

/// The one piece of cross-task shared mutable state: which task, if any,
/// is currently restarting each server. Batch acquisition is all-or-nothing
/// so a rejected admission can never leak partial locks.
///
/// Sync mutex by design; it is never held across an await point.
pub struct ServerLockTable {
    inner: Mutex<HashMap<ServerName, TaskId>>,
}

impl ServerLockTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire every server in the batch for `owner`, or none of them.
    pub fn acquire_all(&self, servers: &[ServerName], owner: &TaskId) -> Result<(), LockConflict> {
        let mut table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        // Check first, insert only when the whole batch is clean.
        for server in servers {
            if let Some(holder) = table.get(server) {
                return Err(LockConflict {
                    server: server.clone(),
                    holder: holder.clone(),
                });
            }
        }
        for server in servers {
            table.insert(server.clone(), owner.clone());
        }
        Ok(())
    }

    /// Release every lock held by `owner`. Called exactly once, when the
    /// owning task reaches a terminal state.
    pub fn release_task(&self, owner: &TaskId) {
        let mut table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        table.retain(|_, holder| holder != owner);
    }

    pub fn holder(&self, server: &ServerName) -> Option<TaskId> {
        let table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        table.get(server).cloned()
    }

    pub fn len(&self) -> usize {
        let table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ServerLockTable {
    fn default() -> Self {
        Self::new()
    }
}
