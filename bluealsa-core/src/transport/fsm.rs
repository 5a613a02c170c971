//! Transport lifecycle state machine (spec §4.7): Idle -> Pending -> Active
//! <-> Paused -> Releasing -> Idle.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// No BT socket, no workers.
    Idle,
    /// `Acquire` in flight.
    Pending,
    /// Socket held, workers running.
    Active,
    /// Socket held, workers parked (all clients paused or none attached).
    Paused,
    /// Tearing down; new `Acquire` calls must wait for `Idle`.
    Releasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    AcquireRequested,
    AcquireSucceeded,
    AcquireFailed,
    AllClientsIdle,
    ClientActive,
    ReleaseRequested,
    ReleaseCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FsmError {
    #[error("event {event:?} is not valid in state {state:?}")]
    InvalidTransition {
        state: TransportState,
        event: TransportEvent,
    },
}

impl TransportState {
    /// Apply one event, returning the new state or an error if the event
    /// doesn't apply to the current state. Unlike bluealsa's C FSM (which
    /// silently ignores unreachable transitions under its big transport
    /// mutex), invalid transitions are surfaced here so a caller bug isn't
    /// swallowed silently.
    pub fn apply(self, event: TransportEvent) -> Result<TransportState, FsmError> {
        use TransportEvent::*;
        use TransportState::*;

        let next = match (self, event) {
            (Idle, AcquireRequested) => Pending,
            (Pending, AcquireSucceeded) => Active,
            (Pending, AcquireFailed) => Idle,
            (Active, AllClientsIdle) => Paused,
            (Paused, ClientActive) => Active,
            (Active, ReleaseRequested) => Releasing,
            (Paused, ReleaseRequested) => Releasing,
            (Pending, ReleaseRequested) => Releasing,
            (Releasing, ReleaseCompleted) => Idle,
            _ => return Err(FsmError::InvalidTransition { state: self, event }),
        };
        Ok(next)
    }

    pub fn is_holding_socket(self) -> bool {
        matches!(self, TransportState::Active | TransportState::Paused)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportState::Idle => "idle",
            TransportState::Pending => "pending",
            TransportState::Active => "active",
            TransportState::Paused => "paused",
            TransportState::Releasing => "releasing",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransportEvent::*;
    use TransportState::*;

    #[test]
    fn happy_path_acquire_to_release() {
        let s = Idle;
        let s = s.apply(AcquireRequested).unwrap();
        assert_eq!(s, Pending);
        let s = s.apply(AcquireSucceeded).unwrap();
        assert_eq!(s, Active);
        let s = s.apply(AllClientsIdle).unwrap();
        assert_eq!(s, Paused);
        let s = s.apply(ClientActive).unwrap();
        assert_eq!(s, Active);
        let s = s.apply(ReleaseRequested).unwrap();
        assert_eq!(s, Releasing);
        let s = s.apply(ReleaseCompleted).unwrap();
        assert_eq!(s, Idle);
    }

    #[test]
    fn acquire_failure_returns_to_idle() {
        let s = Idle.apply(AcquireRequested).unwrap();
        let s = s.apply(AcquireFailed).unwrap();
        assert_eq!(s, Idle);
    }

    #[test]
    fn invalid_transition_is_rejected() {
        assert!(Idle.apply(ClientActive).is_err());
        assert!(Releasing.apply(AcquireRequested).is_err());
    }

    #[test]
    fn holding_socket_only_in_active_or_paused() {
        assert!(!Idle.is_holding_socket());
        assert!(!Pending.is_holding_socket());
        assert!(Active.is_holding_socket());
        assert!(Paused.is_holding_socket());
        assert!(!Releasing.is_holding_socket());
    }
}
