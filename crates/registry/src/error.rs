use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("task already recorded: {0}")]
    AlreadyExists(String),

    #[error("task {0} is not terminal")]
    NotTerminal(String),

    #[error("{0}")]
    Other(String),
}
