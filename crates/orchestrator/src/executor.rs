use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use dbops_restart_domain::{OutputKind, RestartTarget, ServerName};

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("{0}")]
    Failed(String),

    #[error("interrupted by cancellation")]
    Interrupted,
}

/// Signals a per-target worker sends into the drive loop. Each worker
/// sends any number of `Line`s followed by exactly one `Outcome`.
#[derive(Debug)]
pub(crate) enum WorkerSignal {
    Started {
        server: ServerName,
    },
    Line {
        server: ServerName,
        kind: OutputKind,
        line: String,
    },
    Outcome {
        server: ServerName,
        outcome: TargetOutcome,
    },
}

#[derive(Debug)]
pub(crate) enum TargetOutcome {
    Success,
    Failure(String),
    /// Never dispatched: the task was cancelled first.
    Skipped,
}

/// Handle an executor uses to emit progress lines for its target. Lines
/// flow through the worker channel into the drive loop, which assigns
/// sequence numbers and fans them out.
pub struct OutputSink {
    server: ServerName,
    tx: mpsc::Sender<WorkerSignal>,
}

impl OutputSink {
    pub(crate) fn new(server: ServerName, tx: mpsc::Sender<WorkerSignal>) -> Self {
        Self { server, tx }
    }

    pub async fn info(&self, line: impl Into<String>) {
        self.emit(OutputKind::Info, line.into()).await;
    }

    pub async fn warning(&self, line: impl Into<String>) {
        self.emit(OutputKind::Warning, line.into()).await;
    }

    pub async fn error(&self, line: impl Into<String>) {
        self.emit(OutputKind::Error, line.into()).await;
    }

    async fn emit(&self, kind: OutputKind, line: String) {
        // The drive loop outlives every worker; a send failure means the
        // task is being torn down, so the line is dropped.
        let _ = self
            .tx
            .send(WorkerSignal::Line {
                server: self.server.clone(),
                kind,
                line,
            })
            .await;
    }
}

/// The opaque remote operation that actually restarts one database server.
/// Yields typed output lines through the sink and a terminal Ok/Err for the
/// target. The token is advisory: an executor that can interrupt a restart
/// in flight should watch it, but honoring it is best-effort.
#[async_trait]
pub trait RestartExecutor: Send + Sync {
    async fn restart(
        &self,
        target: &RestartTarget,
        log: &OutputSink,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutorError>;
}
