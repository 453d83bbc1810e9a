//! Verification state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//! ┌──────────┐  Begin   ┌────────────┐  Confirmed  ┌────────────┐
//! │   Idle   │ ───────► │  Verifying │ ──────────► │  Verified  │
//! └──────────┘          └─────┬──────┘             └─────┬──────┘
//!      ▲                      │                          │
//!      │   Aborted / Failed   │                          │ Invalidate
//!      ◄──────────────────────┘                          │ (logout, 401)
//!      ▲                                                 │
//!      └─────────────────────────────────────────────────┘
//!
//! Verified ──Begin──► Verifying   (a different token arrived)
//! ```

use rust_fsm::*;

// Generates a module `verify_machine` with State, Input, StateMachine and
// the transition impl.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub verify_machine(Idle)

    Idle => {
        Begin => Verifying
    },
    Verifying => {
        // Reconciliation completed (possibly without a backend profile).
        Confirmed => Verified,
        // Run discarded: missing token at start, or token changed mid-run.
        Aborted => Idle,
        // Fatal failure: session cleared.
        Failed => Idle
    },
    Verified => {
        // A different token needs verifying.
        Begin => Verifying,
        // Logout or backend rejection.
        Invalidate => Idle
    }
}

// Re-export the generated types with clearer names.
pub use verify_machine::Input as VerifyMachineInput;
pub use verify_machine::State as VerifyMachineState;
pub use verify_machine::StateMachine as VerifyMachine;

/// Simplified phase view for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyPhase {
    /// No verification has run, or the session was torn down.
    Idle,
    /// A verification run is in flight.
    Verifying,
    /// The stored token has been reconciled with the backend.
    Verified,
}

impl VerifyPhase {
    /// Returns true once reconciliation has completed.
    pub fn is_verified(&self) -> bool {
        matches!(self, VerifyPhase::Verified)
    }

    /// Returns true while a run is in flight.
    pub fn is_transient(&self) -> bool {
        matches!(self, VerifyPhase::Verifying)
    }
}

impl From<&VerifyMachineState> for VerifyPhase {
    fn from(state: &VerifyMachineState) -> Self {
        match state {
            VerifyMachineState::Idle => VerifyPhase::Idle,
            VerifyMachineState::Verifying => VerifyPhase::Verifying,
            VerifyMachineState::Verified => VerifyPhase::Verified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_idle() {
        let machine = VerifyMachine::new();
        assert_eq!(*machine.state(), VerifyMachineState::Idle);
    }

    #[test]
    fn test_happy_path() {
        let mut machine = VerifyMachine::new();

        machine.consume(&VerifyMachineInput::Begin).unwrap();
        assert_eq!(*machine.state(), VerifyMachineState::Verifying);

        machine.consume(&VerifyMachineInput::Confirmed).unwrap();
        assert_eq!(*machine.state(), VerifyMachineState::Verified);
    }

    #[test]
    fn test_fatal_failure_returns_to_idle() {
        let mut machine = VerifyMachine::new();
        machine.consume(&VerifyMachineInput::Begin).unwrap();

        machine.consume(&VerifyMachineInput::Failed).unwrap();
        assert_eq!(*machine.state(), VerifyMachineState::Idle);
    }

    #[test]
    fn test_abort_returns_to_idle() {
        let mut machine = VerifyMachine::new();
        machine.consume(&VerifyMachineInput::Begin).unwrap();

        machine.consume(&VerifyMachineInput::Aborted).unwrap();
        assert_eq!(*machine.state(), VerifyMachineState::Idle);
    }

    #[test]
    fn test_logout_from_verified() {
        let mut machine = VerifyMachine::new();
        machine.consume(&VerifyMachineInput::Begin).unwrap();
        machine.consume(&VerifyMachineInput::Confirmed).unwrap();

        machine.consume(&VerifyMachineInput::Invalidate).unwrap();
        assert_eq!(*machine.state(), VerifyMachineState::Idle);
    }

    #[test]
    fn test_new_token_reenters_verifying_from_verified() {
        let mut machine = VerifyMachine::new();
        machine.consume(&VerifyMachineInput::Begin).unwrap();
        machine.consume(&VerifyMachineInput::Confirmed).unwrap();

        machine.consume(&VerifyMachineInput::Begin).unwrap();
        assert_eq!(*machine.state(), VerifyMachineState::Verifying);
    }

    #[test]
    fn test_cannot_begin_while_verifying() {
        let mut machine = VerifyMachine::new();
        machine.consume(&VerifyMachineInput::Begin).unwrap();

        // A second trigger during a run is an invalid transition; the
        // manager turns this into a no-op.
        assert!(machine.consume(&VerifyMachineInput::Begin).is_err());
        assert_eq!(*machine.state(), VerifyMachineState::Verifying);
    }

    #[test]
    fn test_cannot_confirm_from_idle() {
        let mut machine = VerifyMachine::new();
        assert!(machine.consume(&VerifyMachineInput::Confirmed).is_err());
    }

    #[test]
    fn test_phase_view() {
        assert!(VerifyPhase::from(&VerifyMachineState::Verified).is_verified());
        assert!(!VerifyPhase::from(&VerifyMachineState::Idle).is_verified());
        assert!(VerifyPhase::from(&VerifyMachineState::Verifying).is_transient());
        assert!(!VerifyPhase::from(&VerifyMachineState::Verified).is_transient());
    }
}
