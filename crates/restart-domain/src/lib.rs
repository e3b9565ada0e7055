pub mod error;
pub mod events;
pub mod ids;
pub mod state;
pub mod target;
pub mod task;

pub use error::DomainError;
pub use events::{OutputEvent, OutputKind, ProgressSnapshot, TaskCompleted, TaskEvent, now_ms};
pub use ids::{ServerName, TaskId};
pub use state::TaskStatus;
pub use target::RestartTarget;
pub use task::RestartTask;
