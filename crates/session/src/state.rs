use crate::error::SessionError;

/// Viewer session state machine. `Error` here is a connectivity failure of
/// this one viewer — independent of how the task itself ended, which
/// arrives as a `TaskCompleted` event while Streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Subscribing,
    Streaming,
    Completed,
    Error,
    Detached,
}

impl SessionState {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Subscribing)
                | (Self::Subscribing, Self::Streaming)
                | (Self::Subscribing, Self::Error)
                | (Self::Subscribing, Self::Detached)
                | (Self::Streaming, Self::Completed)
                | (Self::Streaming, Self::Error)
                | (Self::Streaming, Self::Detached)
                // Retry against the same task, or view a new one.
                | (Self::Error, Self::Subscribing)
                | (Self::Completed, Self::Subscribing)
                | (Self::Detached, Self::Subscribing)
                // Clear the view.
                | (Self::Completed, Self::Idle)
                | (Self::Error, Self::Idle)
                | (Self::Detached, Self::Idle)
        )
    }

    pub fn transition_to(self, next: Self) -> Result<Self, SessionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SessionError::InvalidTransition {
                from: format!("{self:?}"),
                to: format!("{next:?}"),
            })
        }
    }

    /// A task view is on screen (live or settled).
    pub fn is_viewing(self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// The live feed is attached and delivering.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Streaming)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Subscribing => "subscribing",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Detached => "detached",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
