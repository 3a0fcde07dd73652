use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PwaError, Result};

/// Worker lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Script evaluated, nothing dispatched yet
    Parsed,
    Installing,
    /// Installed and waiting for the host to activate it
    Installed,
    Activating,
    /// Intercepting fetches
    Activated,
    /// Install failed or the worker was replaced
    Redundant,
}

impl WorkerState {
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, WorkerState::Activated)
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, WorkerState::Installed)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// The worker's view of its host: current state plus the two lifecycle
/// requests it can make (skip waiting, claim clients).
#[derive(Debug)]
pub struct WorkerScope {
    origin: String,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
    clients_claimed: AtomicBool,
}

impl WorkerScope {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            state: Mutex::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            clients_claimed: AtomicBool::new(false),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move from one of `from` to `to`, failing if the current state is not
    /// one of them.
    pub(crate) fn transition(
        &self,
        from: &[WorkerState],
        to: WorkerState,
        expected: &'static str,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !from.contains(&state) {
            return Err(PwaError::InvalidState {
                expected,
                actual: *state,
            });
        }
        debug!(from = %*state, to = %to, "Worker state change");
        *state = to;
        Ok(())
    }

    pub(crate) fn set_state(&self, to: WorkerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }

    /// Ask the host to activate this worker as soon as it is installed
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Take control of pages that are already open
    pub fn claim_clients(&self) {
        self.clients_claimed.store(true, Ordering::SeqCst);
    }

    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_activated_intercepts() {
        assert!(WorkerState::Activated.can_intercept_fetch());
        assert!(!WorkerState::Installed.can_intercept_fetch());
        assert!(!WorkerState::Activating.can_intercept_fetch());
        assert!(WorkerState::Installed.is_waiting());
    }

    #[test]
    fn test_transition_checks_current_state() {
        let scope = WorkerScope::new("https://app.test");
        assert_eq!(scope.state(), WorkerState::Parsed);
        scope
            .transition(&[WorkerState::Parsed], WorkerState::Installing, "parsed")
            .unwrap();

        let err = scope
            .transition(&[WorkerState::Installed], WorkerState::Activating, "installed")
            .unwrap_err();
        assert!(matches!(
            err,
            PwaError::InvalidState {
                actual: WorkerState::Installing,
                ..
            }
        ));
    }

    #[test]
    fn test_lifecycle_requests() {
        let scope = WorkerScope::new("https://app.test");
        assert!(!scope.skip_waiting_requested());
        scope.skip_waiting();
        scope.claim_clients();
        assert!(scope.skip_waiting_requested());
        assert!(scope.clients_claimed());
    }
}
