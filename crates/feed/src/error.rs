use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown or expired task: {0}")]
    NotFound(String),

    #[error("channel already open for task: {0}")]
    AlreadyOpen(String),

    #[error("channel sealed for task {0}: no events may follow the terminal marker")]
    Sealed(String),
}
