/// Errors for restart domain validation and aggregate mutation.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("invalid task id: {0}")]
    InvalidTaskId(String),

    #[error("invalid server name: {0}")]
    InvalidServerName(String),

    #[error("task must have at least one target")]
    EmptyTargets,

    #[error("duplicate target server: {0}")]
    DuplicateTarget(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("recorded outcomes would exceed target count")]
    OutcomeOverflow,

    #[error("task {0} has unfinished targets")]
    NotTerminal(String),
}
