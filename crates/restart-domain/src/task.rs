use std::collections::HashSet;

use crate::error::DomainError;
use crate::events::now_ms;
use crate::ids::{ServerName, TaskId};
use crate::state::TaskStatus;
use crate::target::RestartTarget;

/// One batch restart operation. Created on a start request, mutated only by
/// the coordinator as per-target outcomes arrive, immutable once terminal.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RestartTask {
    pub task_id: TaskId,
    pub targets: Vec<RestartTarget>,
    pub status: TaskStatus,
    pub initiated_by: String,
    /// Unix millis; set on Pending -> Running.
    pub started_at: Option<u64>,
    /// Unix millis; set when the task reaches a terminal state.
    pub finished_at: Option<u64>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl RestartTask {
    /// Admission validation: the target list must be non-empty with no
    /// duplicate server names. No partial construction on failure.
    pub fn new(
        targets: Vec<RestartTarget>,
        initiated_by: impl Into<String>,
    ) -> Result<Self, DomainError> {
        if targets.is_empty() {
            return Err(DomainError::EmptyTargets);
        }

        let mut seen = HashSet::new();
        for target in &targets {
            if !seen.insert(target.server.as_str()) {
                return Err(DomainError::DuplicateTarget(target.server.to_string()));
            }
        }

        Ok(Self {
            task_id: TaskId::generate(),
            targets,
            status: TaskStatus::Pending,
            initiated_by: initiated_by.into(),
            started_at: None,
            finished_at: None,
            success_count: 0,
            failure_count: 0,
        })
    }

    pub fn server_names(&self) -> Vec<ServerName> {
        self.targets.iter().map(|t| t.server.clone()).collect()
    }

    /// Pending -> Running, stamping `started_at`.
    pub fn begin(&mut self) -> Result<(), DomainError> {
        self.status = self.status.transition_to(TaskStatus::Running)?;
        self.started_at = Some(now_ms());
        Ok(())
    }

    pub fn record_success(&mut self) -> Result<(), DomainError> {
        self.check_can_record()?;
        self.success_count += 1;
        Ok(())
    }

    pub fn record_failure(&mut self) -> Result<(), DomainError> {
        self.check_can_record()?;
        self.failure_count += 1;
        Ok(())
    }

    fn check_can_record(&self) -> Result<(), DomainError> {
        if self.status != TaskStatus::Running {
            return Err(DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: "recorded outcome".to_string(),
            });
        }
        if self.success_count + self.failure_count >= self.targets.len() {
            return Err(DomainError::OutcomeOverflow);
        }
        Ok(())
    }

    pub fn outcomes_recorded(&self) -> usize {
        self.success_count + self.failure_count
    }

    /// Compute the terminal status once every target has an outcome.
    /// Cancelled wins if a cancel was honored; otherwise Failed if any
    /// target failed, Completed if none did.
    pub fn finalize(&mut self, cancelled: bool) -> Result<TaskStatus, DomainError> {
        if self.outcomes_recorded() != self.targets.len() {
            return Err(DomainError::NotTerminal(self.task_id.to_string()));
        }
        let terminal = if cancelled {
            TaskStatus::Cancelled
        } else if self.failure_count > 0 {
            TaskStatus::Failed
        } else {
            TaskStatus::Completed
        };
        self.status = self.status.transition_to(terminal)?;
        self.finished_at = Some(now_ms());
        Ok(terminal)
    }

    pub fn duration_seconds(&self) -> u64 {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => end.saturating_sub(start) / 1000,
            _ => 0,
        }
    }
}
