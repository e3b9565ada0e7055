use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use dbops_restart_domain::{RestartTask, TaskId};

use crate::error::RegistryError;

/// Durable record of restart tasks, queryable after the fact and
/// independent of whether a live viewer was ever attached. The coordinator
/// is the single writer per task.
#[async_trait]
pub trait TaskRegistry: Send + Sync {
    /// Record a freshly admitted task (Pending or Running).
    async fn record_start(&self, task: &RestartTask) -> Result<(), RegistryError>;

    /// Overwrite the record with the task's terminal aggregate state.
    async fn record_terminal(&self, task: &RestartTask) -> Result<(), RegistryError>;

    async fn get(&self, task_id: &TaskId) -> Result<RestartTask, RegistryError>;

    /// Most-recent-first, bounded by `limit`.
    async fn list(&self, limit: usize) -> Result<Vec<RestartTask>, RegistryError>;
}

/// In-process registry backing the console. Insertion order doubles as
/// recency order since task ids are never reused.
pub struct MemoryRegistry {
    inner: Mutex<RegistryState>,
}

struct RegistryState {
    tasks: HashMap<TaskId, RestartTask>,
    order: Vec<TaskId>,
}

impl MemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryState {
                tasks: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskRegistry for MemoryRegistry {
    async fn record_start(&self, task: &RestartTask) -> Result<(), RegistryError> {
        let mut state = self.inner.lock().await;
        if state.tasks.contains_key(&task.task_id) {
            return Err(RegistryError::AlreadyExists(task.task_id.to_string()));
        }
        state.order.push(task.task_id.clone());
        state.tasks.insert(task.task_id.clone(), task.clone());
        Ok(())
    }

    async fn record_terminal(&self, task: &RestartTask) -> Result<(), RegistryError> {
        if !task.status.is_terminal() {
            return Err(RegistryError::NotTerminal(task.task_id.to_string()));
        }
        let mut state = self.inner.lock().await;
        match state.tasks.get_mut(&task.task_id) {
            Some(existing) => {
                *existing = task.clone();
                Ok(())
            }
            None => Err(RegistryError::NotFound(task.task_id.to_string())),
        }
    }

    async fn get(&self, task_id: &TaskId) -> Result<RestartTask, RegistryError> {
        let state = self.inner.lock().await;
        state
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(task_id.to_string()))
    }

    async fn list(&self, limit: usize) -> Result<Vec<RestartTask>, RegistryError> {
        let state = self.inner.lock().await;
        Ok(state
            .order
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| state.tasks.get(id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbops_restart_domain::{RestartTarget, ServerName};

    fn task(server: &str) -> RestartTask {
        RestartTask::new(
            vec![RestartTarget::new(
                ServerName::new(server).unwrap(),
                "test",
            )],
            "dba@corp",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn record_start_then_get() {
        let registry = MemoryRegistry::new();
        let t = task("sql-a");
        registry.record_start(&t).await.unwrap();

        let got = registry.get(&t.task_id).await.unwrap();
        assert_eq!(got.task_id, t.task_id);
        assert_eq!(got.initiated_by, "dba@corp");
    }

    #[tokio::test]
    async fn record_start_twice_rejected() {
        let registry = MemoryRegistry::new();
        let t = task("sql-a");
        registry.record_start(&t).await.unwrap();
        assert!(matches!(
            registry.record_start(&t).await,
            Err(RegistryError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let registry = MemoryRegistry::new();
        let id = dbops_restart_domain::TaskId::generate();
        assert!(matches!(
            registry.get(&id).await,
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn record_terminal_requires_terminal_status() {
        let registry = MemoryRegistry::new();
        let t = task("sql-a");
        registry.record_start(&t).await.unwrap();
        // Still pending.
        assert!(matches!(
            registry.record_terminal(&t).await,
            Err(RegistryError::NotTerminal(_))
        ));
    }

    #[tokio::test]
    async fn record_terminal_overwrites_aggregate() {
        let registry = MemoryRegistry::new();
        let mut t = task("sql-a");
        registry.record_start(&t).await.unwrap();

        t.begin().unwrap();
        t.record_success().unwrap();
        t.finalize(false).unwrap();
        registry.record_terminal(&t).await.unwrap();

        let got = registry.get(&t.task_id).await.unwrap();
        assert!(got.status.is_terminal());
        assert_eq!(got.success_count, 1);
        assert!(got.finished_at.is_some());
    }

    #[tokio::test]
    async fn list_most_recent_first_bounded() {
        let registry = MemoryRegistry::new();
        let first = task("sql-a");
        let second = task("sql-b");
        let third = task("sql-c");
        registry.record_start(&first).await.unwrap();
        registry.record_start(&second).await.unwrap();
        registry.record_start(&third).await.unwrap();

        let listed = registry.list(2).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].task_id, third.task_id);
        assert_eq!(listed[1].task_id, second.task_id);
    }
}
