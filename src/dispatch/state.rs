//! Per-call lifecycle state machine

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Stage of a single dispatched call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallState {
    Pending,
    Rendering,
    Invoking,
    RetryWait,
    Decoding,
    Succeeded,
    Failed,
}

impl CallState {
    /// Whether no transition may leave this state
    pub fn is_terminal(self) -> bool {
        matches!(self, CallState::Succeeded | CallState::Failed)
    }

    /// Whether `next` is a legal successor
    pub fn can_transition_to(self, next: CallState) -> bool {
        use CallState::*;
        match (self, next) {
            (Succeeded | Failed, _) => false,
            (_, Failed) => true,
            (Pending, Rendering) => true,
            (Rendering, Invoking) => true,
            (Invoking, RetryWait | Decoding) => true,
            // An invalid-request report sends the call back through rendering
            (RetryWait, Invoking | Rendering) => true,
            (Decoding, Succeeded) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallState::Pending => "PENDING",
            CallState::Rendering => "RENDERING",
            CallState::Invoking => "INVOKING",
            CallState::RetryWait => "RETRY_WAIT",
            CallState::Decoding => "DECODING",
            CallState::Succeeded => "SUCCEEDED",
            CallState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Illegal lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Illegal call state transition: {from} -> {to}")]
pub struct StateError {
    pub from: CallState,
    pub to: CallState,
}

/// Tracks the states one call has passed through
#[derive(Debug, Clone)]
pub struct CallLifecycle {
    history: Vec<CallState>,
}

impl CallLifecycle {
    /// Start a lifecycle in [`CallState::Pending`]
    pub fn new() -> Self {
        Self {
            history: vec![CallState::Pending],
        }
    }

    /// Current state
    pub fn current(&self) -> CallState {
        // history is never empty
        self.history
            .last()
            .copied()
            .unwrap_or(CallState::Pending)
    }

    /// Move to `next`, rejecting illegal transitions
    pub fn transition(&mut self, next: CallState) -> Result<(), StateError> {
        let from = self.current();
        if !from.can_transition_to(next) {
            return Err(StateError { from, to: next });
        }
        debug!(from = %from, to = %next, "call state transition");
        self.history.push(next);
        Ok(())
    }

    /// Whether the call has finished
    pub fn is_finished(&self) -> bool {
        self.current().is_terminal()
    }

    /// Every state visited, in order
    pub fn history(&self) -> &[CallState] {
        &self.history
    }

    pub fn into_history(self) -> Vec<CallState> {
        self.history
    }
}

impl Default for CallLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CallState::*;

    #[test]
    fn test_happy_path() {
        let mut lifecycle = CallLifecycle::new();
        for state in [Rendering, Invoking, Decoding, Succeeded] {
            lifecycle.transition(state).unwrap();
        }
        assert!(lifecycle.is_finished());
        assert_eq!(
            lifecycle.history(),
            &[Pending, Rendering, Invoking, Decoding, Succeeded]
        );
    }

    #[test]
    fn test_retry_loop() {
        let mut lifecycle = CallLifecycle::new();
        for state in [
            Rendering, Invoking, RetryWait, Invoking, RetryWait, Rendering, Invoking, Decoding,
            Failed,
        ] {
            lifecycle.transition(state).unwrap();
        }
        assert_eq!(lifecycle.current(), Failed);
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [Succeeded, Failed] {
            for next in [
                Pending, Rendering, Invoking, RetryWait, Decoding, Succeeded, Failed,
            ] {
                assert!(!terminal.can_transition_to(next), "{} -> {}", terminal, next);
            }
        }

        let mut lifecycle = CallLifecycle::new();
        lifecycle.transition(Failed).unwrap();
        let err = lifecycle.transition(Rendering).unwrap_err();
        assert_eq!(err, StateError { from: Failed, to: Rendering });
        assert_eq!(lifecycle.history(), &[Pending, Failed]);
    }

    #[test]
    fn test_illegal_shortcuts() {
        assert!(!Pending.can_transition_to(Invoking));
        assert!(!Rendering.can_transition_to(Decoding));
        assert!(!Invoking.can_transition_to(Succeeded));
        assert!(!Decoding.can_transition_to(RetryWait));
    }

    #[test]
    fn test_display() {
        assert_eq!(RetryWait.to_string(), "RETRY_WAIT");
        assert_eq!(
            serde_json::to_string(&RetryWait).unwrap(),
            "\"RETRY_WAIT\""
        );
    }
}
