use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("event for task {got} delivered to session viewing {expected}")]
    WrongTask { expected: String, got: String },

    #[error("out-of-order output event: expected seq {expected}, got {got}")]
    OutOfOrder { expected: u64, got: u64 },
}
