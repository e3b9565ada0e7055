use thiserror::Error;

use dbops_feed::FeedError;
use dbops_registry::RegistryError;
use dbops_restart_domain::DomainError;

use crate::locks::LockConflict;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Admission rejected: empty or duplicate target list. No task created.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] DomainError),

    /// A target is already locked by another running task. The whole
    /// request is rejected; no partial task or lock state is left behind.
    #[error("server {server} is locked by running task {holder}")]
    Conflict { server: String, holder: String },

    #[error("task not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Feed(#[from] FeedError),
}

impl From<LockConflict> for OrchestratorError {
    fn from(conflict: LockConflict) -> Self {
        Self::Conflict {
            server: conflict.server.to_string(),
            holder: conflict.holder.to_string(),
        }
    }
}
