use crate::ids::TaskId;
use crate::state::TaskStatus;

/// Unix milliseconds now.
///
/// # Panics
/// Panics if the system clock is before the Unix epoch.
#[allow(clippy::cast_possible_truncation)] // millis since epoch fits in u64 until year 584556
#[must_use]
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as u64
}

/// Severity of one output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Info,
    Warning,
    Error,
    Success,
}

/// One ordered log line belonging to exactly one task. Immutable once
/// emitted, never retracted. `seq` is gapless and strictly increasing per
/// task, starting at 0 — the ordering invariant every viewer relies on.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OutputEvent {
    pub task_id: TaskId,
    pub seq: u64,
    pub timestamp_ms: u64,
    pub kind: OutputKind,
    pub line: String,
}

/// Coalesced progress indicator. Supersedes the previous snapshot;
/// consumers only need the latest value.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProgressSnapshot {
    pub phase: String,
    pub current_server: Option<String>,
    pub current_index: usize,
    pub total_servers: usize,
    pub percent_complete: u8,
}

impl ProgressSnapshot {
    /// Percent from finished-outcome count over total. Saturates at 100.
    #[allow(clippy::cast_possible_truncation)] // bounded to 0..=100
    #[must_use]
    pub fn percent(done: usize, total: usize) -> u8 {
        if total == 0 {
            return 100;
        }
        ((done * 100 / total).min(100)) as u8
    }
}

/// End-of-stream marker: always the last event a subscriber sees for a task.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TaskCompleted {
    pub status: TaskStatus,
    pub success_count: usize,
    pub failure_count: usize,
    pub duration_seconds: u64,
}

/// The three message kinds on the per-task viewer channel.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TaskEvent {
    Output(OutputEvent),
    Progress(ProgressSnapshot),
    Completed(TaskCompleted),
}

impl TaskEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}
