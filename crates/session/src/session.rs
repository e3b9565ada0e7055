use dbops_restart_domain::{OutputEvent, ProgressSnapshot, TaskCompleted, TaskEvent, TaskId};

use crate::error::SessionError;
use crate::state::SessionState;

/// One browser tab's view of at most one restart task: an append-only log,
/// the latest progress snapshot, and the terminal summary once it arrives.
///
/// Because the feed replays its full buffer on every subscribe, a reconnect
/// clears the log and re-renders from scratch — correctness over minimality.
#[derive(Debug)]
pub struct ClientSession {
    state: SessionState,
    task_id: Option<TaskId>,
    log: Vec<OutputEvent>,
    progress: Option<ProgressSnapshot>,
    completion: Option<TaskCompleted>,
}

impl ClientSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            task_id: None,
            log: Vec::new(),
            progress: None,
            completion: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        self.task_id.as_ref()
    }

    pub fn log(&self) -> &[OutputEvent] {
        &self.log
    }

    pub fn progress(&self) -> Option<&ProgressSnapshot> {
        self.progress.as_ref()
    }

    pub fn completion(&self) -> Option<&TaskCompleted> {
        self.completion.as_ref()
    }

    /// Start viewing a task. A session views one task at a time: any
    /// existing view is forced back to Idle first, dropping its log.
    pub fn begin_subscribe(&mut self, task_id: TaskId) {
        self.reset();
        self.state = SessionState::Subscribing;
        self.task_id = Some(task_id);
    }

    /// The subscription came up; events will follow.
    pub fn on_subscribed(&mut self) -> Result<(), SessionError> {
        self.state = self.state.transition_to(SessionState::Streaming)?;
        Ok(())
    }

    /// Feed one event from the transport into the view.
    pub fn on_event(&mut self, event: TaskEvent) -> Result<(), SessionError> {
        if self.state != SessionState::Streaming {
            return Err(SessionError::InvalidTransition {
                from: format!("{:?}", self.state),
                to: "event delivery".to_string(),
            });
        }

        match event {
            TaskEvent::Output(output) => {
                self.check_task(&output.task_id)?;
                // Replay starts at 0 and is gapless; anything else is a
                // transport-ordering violation.
                let expected = self.log.len() as u64;
                if output.seq != expected {
                    return Err(SessionError::OutOfOrder {
                        expected,
                        got: output.seq,
                    });
                }
                self.log.push(output);
            }
            TaskEvent::Progress(snapshot) => {
                self.progress = Some(snapshot);
            }
            TaskEvent::Completed(summary) => {
                self.completion = Some(summary);
                self.state = self.state.transition_to(SessionState::Completed)?;
            }
        }
        Ok(())
    }

    /// Transport dropped. The log stays on screen behind the connectivity
    /// indicator; the task id is kept so `retry` can resubscribe.
    pub fn on_transport_error(&mut self) -> Result<(), SessionError> {
        self.state = self.state.transition_to(SessionState::Error)?;
        Ok(())
    }

    /// Resubscribe to the same task after a transport failure. The log is
    /// cleared because the feed will replay the whole buffer.
    pub fn retry(&mut self) -> Result<(), SessionError> {
        self.state = self.state.transition_to(SessionState::Subscribing)?;
        self.log.clear();
        self.progress = None;
        self.completion = None;
        Ok(())
    }

    /// Explicit unsubscribe; the view stays visible until cleared.
    pub fn detach(&mut self) -> Result<(), SessionError> {
        self.state = self.state.transition_to(SessionState::Detached)?;
        Ok(())
    }

    /// Clear the settled view and return to Idle.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.state = self.state.transition_to(SessionState::Idle)?;
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.task_id = None;
        self.log.clear();
        self.progress = None;
        self.completion = None;
    }

    fn check_task(&self, task_id: &TaskId) -> Result<(), SessionError> {
        match &self.task_id {
            Some(viewing) if viewing == task_id => Ok(()),
            Some(viewing) => Err(SessionError::WrongTask {
                expected: viewing.to_string(),
                got: task_id.to_string(),
            }),
            None => Err(SessionError::WrongTask {
                expected: "none".to_string(),
                got: task_id.to_string(),
            }),
        }
    }
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbops_restart_domain::{OutputKind, TaskStatus, now_ms};

    fn output(task_id: &TaskId, seq: u64) -> TaskEvent {
        TaskEvent::Output(OutputEvent {
            task_id: task_id.clone(),
            seq,
            timestamp_ms: now_ms(),
            kind: OutputKind::Info,
            line: format!("line {seq}"),
        })
    }

    fn progress(percent: u8) -> TaskEvent {
        TaskEvent::Progress(ProgressSnapshot {
            phase: "restarting".to_string(),
            current_server: Some("sql-a".to_string()),
            current_index: 1,
            total_servers: 2,
            percent_complete: percent,
        })
    }

    fn completed(status: TaskStatus) -> TaskEvent {
        TaskEvent::Completed(TaskCompleted {
            status,
            success_count: 1,
            failure_count: 1,
            duration_seconds: 12,
        })
    }

    fn streaming_session() -> (ClientSession, TaskId) {
        let id = TaskId::generate();
        let mut session = ClientSession::new();
        session.begin_subscribe(id.clone());
        session.on_subscribed().unwrap();
        (session, id)
    }

    #[test]
    fn log_appends_and_progress_replaces() {
        let (mut session, id) = streaming_session();
        session.on_event(output(&id, 0)).unwrap();
        session.on_event(progress(10)).unwrap();
        session.on_event(output(&id, 1)).unwrap();
        session.on_event(progress(50)).unwrap();

        assert_eq!(session.log().len(), 2);
        assert_eq!(session.progress().unwrap().percent_complete, 50);
    }

    #[test]
    fn out_of_order_event_rejected() {
        let (mut session, id) = streaming_session();
        session.on_event(output(&id, 0)).unwrap();
        let err = session.on_event(output(&id, 2)).unwrap_err();
        assert!(matches!(
            err,
            SessionError::OutOfOrder {
                expected: 1,
                got: 2
            }
        ));
    }

    #[test]
    fn event_for_other_task_rejected() {
        let (mut session, _) = streaming_session();
        let other = TaskId::generate();
        assert!(matches!(
            session.on_event(output(&other, 0)),
            Err(SessionError::WrongTask { .. })
        ));
    }

    #[test]
    fn terminal_event_settles_view_but_keeps_log() {
        let (mut session, id) = streaming_session();
        session.on_event(output(&id, 0)).unwrap();
        session.on_event(completed(TaskStatus::Failed)).unwrap();

        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(session.log().len(), 1);
        assert_eq!(session.completion().unwrap().status, TaskStatus::Failed);

        // No events after the terminal marker.
        assert!(session.on_event(output(&id, 1)).is_err());
    }

    #[test]
    fn session_error_is_not_task_failure() {
        let (mut session, id) = streaming_session();
        session.on_event(output(&id, 0)).unwrap();
        session.on_transport_error().unwrap();

        // Connectivity failed but no task verdict arrived.
        assert_eq!(session.state(), SessionState::Error);
        assert!(session.completion().is_none());
        assert_eq!(session.log().len(), 1);
    }

    #[test]
    fn retry_resubscribes_same_task_with_cleared_log() {
        let (mut session, id) = streaming_session();
        session.on_event(output(&id, 0)).unwrap();
        session.on_transport_error().unwrap();

        session.retry().unwrap();
        assert_eq!(session.state(), SessionState::Subscribing);
        assert_eq!(session.task_id(), Some(&id));
        assert!(session.log().is_empty());

        // Full-buffer replay starts over at seq 0.
        session.on_subscribed().unwrap();
        session.on_event(output(&id, 0)).unwrap();
        assert_eq!(session.log().len(), 1);
    }

    #[test]
    fn new_task_forces_old_view_out() {
        let (mut session, id) = streaming_session();
        session.on_event(output(&id, 0)).unwrap();

        let next = TaskId::generate();
        session.begin_subscribe(next.clone());
        assert_eq!(session.state(), SessionState::Subscribing);
        assert_eq!(session.task_id(), Some(&next));
        assert!(session.log().is_empty());
    }

    #[test]
    fn detach_then_clear() {
        let (mut session, _) = streaming_session();
        session.detach().unwrap();
        assert_eq!(session.state(), SessionState::Detached);
        session.clear().unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.task_id().is_none());
    }

    #[test]
    fn clear_only_from_settled_states() {
        let (mut session, _) = streaming_session();
        assert!(session.clear().is_err()); // still streaming
    }

    #[test]
    fn no_events_outside_streaming() {
        let id = TaskId::generate();
        let mut session = ClientSession::new();
        assert!(session.on_event(output(&id, 0)).is_err());

        session.begin_subscribe(id.clone());
        // Subscription still in flight.
        assert!(session.on_event(output(&id, 0)).is_err());
    }
}
