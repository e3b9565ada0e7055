use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

use dbops_feed::OutputBroadcaster;
use dbops_registry::{RegistryError, TaskRegistry};
use dbops_restart_domain::{
    OutputEvent, OutputKind, ProgressSnapshot, RestartTarget, RestartTask, TaskCompleted,
    TaskEvent, TaskId, now_ms,
};

use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::executor::{OutputSink, RestartExecutor, TargetOutcome, WorkerSignal};
use crate::locks::ServerLockTable;

/// Owns the lifecycle of restart tasks: admission, per-target execution,
/// output sequencing, cancellation, and the terminal write to the registry.
///
/// Per-target workers run behind a semaphore and feed one signal channel;
/// a single drive loop per task drains it and owns the monotonic sequence
/// counter, so output order is global across concurrent targets without a
/// shared counter on the hot path.
pub struct TaskCoordinator {
    executor: Arc<dyn RestartExecutor>,
    registry: Arc<dyn TaskRegistry>,
    feed: Arc<OutputBroadcaster>,
    locks: ServerLockTable,
    config: OrchestratorConfig,
    active: Mutex<HashMap<TaskId, CancellationToken>>,
}

impl TaskCoordinator {
    pub fn new(
        executor: Arc<dyn RestartExecutor>,
        registry: Arc<dyn TaskRegistry>,
        feed: Arc<OutputBroadcaster>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            executor,
            registry,
            feed,
            locks: ServerLockTable::new(),
            config,
            active: Mutex::new(HashMap::new()),
        })
    }

    /// Admit and launch a restart task. Validates the target list, takes
    /// every per-server lock all-or-nothing, records the task, opens its
    /// feed channel, and spawns the drive loop. Returns as soon as the task
    /// is admitted; it never waits for execution.
    pub async fn start(
        self: &Arc<Self>,
        targets: Vec<RestartTarget>,
        initiated_by: impl Into<String>,
    ) -> Result<TaskId, OrchestratorError> {
        let mut task = RestartTask::new(targets, initiated_by)?;
        let task_id = task.task_id.clone();
        let servers = task.server_names();

        self.locks.acquire_all(&servers, &task_id)?;

        if let Err(e) = self.registry.record_start(&task).await {
            self.locks.release_task(&task_id);
            return Err(e.into());
        }
        if let Err(e) = self.feed.open(&task_id).await {
            self.locks.release_task(&task_id);
            return Err(e.into());
        }

        task.begin()?;
        let token = CancellationToken::new();
        self.active_map().insert(task_id.clone(), token.clone());

        tracing::info!(
            task_id = %task_id,
            targets = servers.len(),
            initiated_by = %task.initiated_by,
            "restart task admitted"
        );

        let this = self.clone();
        tokio::spawn(async move {
            this.drive(task, token).await;
        });

        Ok(task_id)
    }

    /// Request cancellation of a running task. Cooperative: workers stop
    /// picking up new targets and in-flight executors get the token.
    /// Idempotent — cancelling an already-terminal task is a no-op.
    pub async fn cancel(&self, task_id: &TaskId) -> Result<(), OrchestratorError> {
        let token = self.active_map().get(task_id).cloned();
        if let Some(token) = token {
            tracing::info!(task_id = %task_id, "cancellation requested");
            token.cancel();
            return Ok(());
        }

        match self.registry.get(task_id).await {
            Ok(_) => Ok(()),
            Err(RegistryError::NotFound(_)) => Err(OrchestratorError::NotFound(task_id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Task ids currently running.
    pub fn active_tasks(&self) -> Vec<TaskId> {
        self.active_map().keys().cloned().collect()
    }

    fn active_map(&self) -> std::sync::MutexGuard<'_, HashMap<TaskId, CancellationToken>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn drive(self: Arc<Self>, mut task: RestartTask, token: CancellationToken) {
        let task_id = task.task_id.clone();
        if let Err(error) = self.run(&mut task, &token).await {
            tracing::error!(task_id = %task_id, %error, "restart task drive loop failed");
        }
        // Terminal path already released; this covers the failure path.
        self.locks.release_task(&task_id);
        self.active_map().remove(&task_id);
    }

    async fn run(
        &self,
        task: &mut RestartTask,
        token: &CancellationToken,
    ) -> Result<(), OrchestratorError> {
        let total = task.targets.len();
        let (tx, mut rx) = mpsc::channel::<WorkerSignal>(self.config.signal_buffer);

        // Dispatcher walks the targets in request order, gated by the
        // parallelism semaphore, and spawns one worker per target. Checking
        // the token after the permit (not before) is the cancellation
        // guarantee: no new target starts once cancel has fired, while
        // in-flight executors get the token and finish on their own terms.
        {
            let targets = task.targets.clone();
            let tx = tx.clone();
            let token = token.clone();
            let executor = self.executor.clone();
            let max_parallel = self.config.max_parallel.max(1);
            tokio::spawn(async move {
                let semaphore = Arc::new(Semaphore::new(max_parallel));
                for target in targets {
                    let Ok(permit) = semaphore.clone().acquire_owned().await else {
                        break;
                    };
                    let server = target.server.clone();

                    if token.is_cancelled() {
                        let _ = tx
                            .send(WorkerSignal::Outcome {
                                server,
                                outcome: TargetOutcome::Skipped,
                            })
                            .await;
                        continue;
                    }

                    let tx = tx.clone();
                    let token = token.clone();
                    let executor = executor.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        let _ = tx
                            .send(WorkerSignal::Started {
                                server: server.clone(),
                            })
                            .await;

                        let sink = OutputSink::new(server.clone(), tx.clone());
                        let outcome = match executor.restart(&target, &sink, &token).await {
                            Ok(()) => TargetOutcome::Success,
                            Err(e) => TargetOutcome::Failure(e.to_string()),
                        };
                        let _ = tx.send(WorkerSignal::Outcome { server, outcome }).await;
                    });
                }
            });
        }
        drop(tx);

        // Single writer: this loop owns the sequence counter. Each worker
        // sends its Outcome last, so once every outcome is in, no line for
        // this task can still be queued behind it.
        let mut seq: u64 = 0;
        while let Some(signal) = rx.recv().await {
            match signal {
                WorkerSignal::Started { server } => {
                    tracing::debug!(task_id = %task.task_id, server = %server, "dispatching restart");
                    self.publish_progress(task, "restarting", Some(server.to_string()))
                        .await;
                }
                WorkerSignal::Line { server, kind, line } => {
                    self.publish_output(task, &mut seq, kind, format!("{server}: {line}"))
                        .await;
                }
                WorkerSignal::Outcome { server, outcome } => {
                    // Counter first, then the line reporting it, then the
                    // snapshot reflecting it — a viewer never sees a count
                    // that lags the event it arrived with.
                    match outcome {
                        TargetOutcome::Success => {
                            task.record_success()?;
                            self.publish_output(
                                task,
                                &mut seq,
                                OutputKind::Success,
                                format!("{server}: restart completed"),
                            )
                            .await;
                        }
                        TargetOutcome::Failure(reason) => {
                            task.record_failure()?;
                            self.publish_output(
                                task,
                                &mut seq,
                                OutputKind::Error,
                                format!("{server}: {reason}"),
                            )
                            .await;
                        }
                        TargetOutcome::Skipped => {
                            task.record_failure()?;
                            self.publish_output(
                                task,
                                &mut seq,
                                OutputKind::Warning,
                                format!("{server}: skipped, task cancelled"),
                            )
                            .await;
                        }
                    }
                    self.publish_progress(task, "restarting", Some(server.to_string()))
                        .await;
                    if task.outcomes_recorded() == total {
                        break;
                    }
                }
            }
        }

        let cancelled = token.is_cancelled();
        let terminal = task.finalize(cancelled)?;
        self.registry.record_terminal(task).await?;
        self.locks.release_task(&task.task_id);

        self.publish_progress(task, "finished", None).await;
        let marker = TaskEvent::Completed(TaskCompleted {
            status: terminal,
            success_count: task.success_count,
            failure_count: task.failure_count,
            duration_seconds: task.duration_seconds(),
        });
        if let Err(error) = self.feed.publish(&task.task_id, marker).await {
            tracing::warn!(task_id = %task.task_id, %error, "terminal event not published");
        }

        tracing::info!(
            task_id = %task.task_id,
            status = %terminal,
            success = task.success_count,
            failure = task.failure_count,
            duration_seconds = task.duration_seconds(),
            "restart task finished"
        );
        Ok(())
    }

    async fn publish_output(&self, task: &RestartTask, seq: &mut u64, kind: OutputKind, line: String) {
        let event = TaskEvent::Output(OutputEvent {
            task_id: task.task_id.clone(),
            seq: *seq,
            timestamp_ms: now_ms(),
            kind,
            line,
        });
        *seq += 1;
        if let Err(error) = self.feed.publish(&task.task_id, event).await {
            tracing::warn!(task_id = %task.task_id, %error, "output event not published");
        }
    }

    async fn publish_progress(&self, task: &RestartTask, phase: &str, current_server: Option<String>) {
        let done = task.outcomes_recorded();
        let total = task.targets.len();
        let event = TaskEvent::Progress(ProgressSnapshot {
            phase: phase.to_string(),
            current_server,
            current_index: done,
            total_servers: total,
            percent_complete: ProgressSnapshot::percent(done, total),
        });
        if let Err(error) = self.feed.publish(&task.task_id, event).await {
            tracing::warn!(task_id = %task.task_id, %error, "progress snapshot not published");
        }
    }
}
