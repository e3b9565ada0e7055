use std::collections::VecDeque;
use tokio::sync::mpsc;

use dbops_restart_domain::TaskEvent;

/// One subscriber's view of a task: every already-buffered event in order,
/// then live events as they arrive. Dropping the stream detaches the
/// subscriber without affecting the task or other viewers.
pub struct TaskEventStream {
    pub(crate) backlog: VecDeque<TaskEvent>,
    pub(crate) live: mpsc::Receiver<TaskEvent>,
}

impl TaskEventStream {
    /// Next event, or `None` once the channel is closed. The terminal
    /// `Completed` event is always the last `Some` for a finished task.
    pub async fn recv(&mut self) -> Option<TaskEvent> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }
        self.live.recv().await
    }

    /// Drain whatever is immediately available without waiting.
    pub fn try_recv(&mut self) -> Option<TaskEvent> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }
        self.live.try_recv().ok()
    }
}
