//! Session state machine.

use std::fmt;

/// Lifecycle state of a live-serve session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No server or watcher running.
    #[default]
    Offline,
    /// `go_live` in progress.
    Starting,
    /// Serving and watching.
    Online,
    /// `go_offline` in progress.
    Stopping,
}

impl SessionState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Offline -> Starting
    /// - Starting -> Online
    /// - Starting -> Offline (rollback after a failed start)
    /// - Online -> Stopping
    /// - Stopping -> Offline
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (*self, target),
            (Offline, Starting)
                | (Starting, Online)
                | (Starting, Offline)
                | (Online, Stopping)
                | (Stopping, Offline)
        )
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: SessionState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::LiveServeError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Whether the session is serving.
    pub fn is_online(&self) -> bool {
        matches!(self, SessionState::Online)
    }

    /// Whether a lifecycle operation is in flight.
    pub fn is_transitional(&self) -> bool {
        matches!(self, SessionState::Starting | SessionState::Stopping)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Offline => "offline",
            SessionState::Starting => "starting",
            SessionState::Online => "online",
            SessionState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}
