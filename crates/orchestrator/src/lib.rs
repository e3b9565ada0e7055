mod config;
mod coordinator;
mod error;
mod executor;
mod locks;

pub use config::OrchestratorConfig;
pub use coordinator::TaskCoordinator;
pub use error::OrchestratorError;
pub use executor::{ExecutorError, OutputSink, RestartExecutor};
pub use locks::{LockConflict, ServerLockTable};
