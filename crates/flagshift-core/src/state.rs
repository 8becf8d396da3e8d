//! Pass state machine

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::MigrationError;

/// Phase of a migration pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassState {
    Idle,
    Scanning,
    Classifying,
    Rewriting,
    Reporting,
    Done,
    Failed,
}

impl PassState {
    /// All states, in pipeline order
    pub const ALL: [PassState; 7] = [
        PassState::Idle,
        PassState::Scanning,
        PassState::Classifying,
        PassState::Rewriting,
        PassState::Reporting,
        PassState::Done,
        PassState::Failed,
    ];

    /// States reachable in one step
    #[must_use]
    pub fn allowed_transitions(self) -> &'static [PassState] {
        match self {
            PassState::Idle => &[PassState::Scanning, PassState::Failed],
            PassState::Scanning => &[PassState::Classifying, PassState::Failed],
            PassState::Classifying => &[PassState::Rewriting, PassState::Failed],
            PassState::Rewriting => &[PassState::Reporting, PassState::Failed],
            PassState::Reporting => &[PassState::Done, PassState::Failed],
            PassState::Done | PassState::Failed => &[],
        }
    }

    #[inline]
    #[must_use]
    pub fn can_transition_to(self, next: PassState) -> bool {
        self.allowed_transitions().contains(&next)
    }

    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, PassState::Done | PassState::Failed)
    }
}

/// Check a transition against the table
///
/// # Errors
///
/// Returns [`MigrationError::InvalidTransition`] for edges not in the table.
pub fn validate_transition(from: PassState, to: PassState) -> Result<(), MigrationError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(MigrationError::InvalidTransition { from, to })
    }
}

/// Shared, thread-safe current state of a pass
#[derive(Debug)]
pub struct PassTracker {
    state: Mutex<PassState>,
}

impl Default for PassTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PassTracker {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PassState::Idle),
        }
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> PassState {
        *self.state.lock()
    }

    /// Move to `next`
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::InvalidTransition`] if the move is not allowed.
    pub fn transition(&self, next: PassState) -> Result<(), MigrationError> {
        let mut state = self.state.lock();
        validate_transition(*state, next)?;
        tracing::info!("pass state: {:?} -> {:?}", *state, next);
        *state = next;
        Ok(())
    }

    /// Move to `Failed` unless already terminal
    pub fn fail(&self) {
        let mut state = self.state.lock();
        if !state.is_terminal() {
            tracing::warn!("pass failed during {:?}", *state);
            *state = PassState::Failed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn happy_path() {
        let tracker = PassTracker::new();
        for next in [
            PassState::Scanning,
            PassState::Classifying,
            PassState::Rewriting,
            PassState::Reporting,
            PassState::Done,
        ] {
            tracker.transition(next).unwrap();
        }
        assert_eq!(tracker.current(), PassState::Done);
    }

    #[test]
    fn skipping_a_phase_is_rejected() {
        let tracker = PassTracker::new();
        tracker.transition(PassState::Scanning).unwrap();
        let err = tracker.transition(PassState::Rewriting).unwrap_err();
        assert!(matches!(
            err,
            MigrationError::InvalidTransition {
                from: PassState::Scanning,
                to: PassState::Rewriting
            }
        ));
        assert_eq!(tracker.current(), PassState::Scanning);
    }

    #[test]
    fn fail_is_sticky() {
        let tracker = PassTracker::new();
        tracker.transition(PassState::Scanning).unwrap();
        tracker.fail();
        tracker.fail();
        assert_eq!(tracker.current(), PassState::Failed);
        assert!(tracker.transition(PassState::Classifying).is_err());
    }

    fn state() -> impl Strategy<Value = PassState> {
        prop::sample::select(PassState::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn failed_reachable_from_every_non_terminal_state(from in state()) {
            prop_assert_eq!(from.can_transition_to(PassState::Failed), !from.is_terminal());
        }

        #[test]
        fn terminal_states_have_no_exits(from in state(), to in state()) {
            if from.is_terminal() {
                prop_assert!(validate_transition(from, to).is_err());
            }
        }

        #[test]
        fn at_most_one_forward_edge(from in state()) {
            let forward = from
                .allowed_transitions()
                .iter()
                .filter(|s| **s != PassState::Failed)
                .count();
            prop_assert!(forward <= 1);
        }
    }
}
