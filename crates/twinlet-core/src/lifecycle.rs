//! Instance lifecycle state machine.
//!
//! ```text
//! Unconstructed --[setup]--> PortsDeclared --[layout]--> LaidOut --[activate]--> Active
//!       |                          |                        |                      |
//!       +--------------------------+------------------------+----------------------+--> TornDown
//! ```
//!
//! Teardown is reachable from every state except itself, so a failed
//! `setup()` still releases whatever ports it managed to declare.

use crate::error::LifecycleError;

/// Where an instance is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Unconstructed,
    PortsDeclared,
    LaidOut,
    Active,
    TornDown,
}

impl LifecycleState {
    /// Returns true if `to` directly follows `self`.
    pub const fn can_advance_to(self, to: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, to),
            (Unconstructed, PortsDeclared)
                | (PortsDeclared, LaidOut)
                | (LaidOut, Active)
                | (Unconstructed | PortsDeclared | LaidOut | Active, TornDown)
        )
    }
}

/// Tracks the current state and rejects out-of-order transitions.
#[derive(Debug, Default)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == LifecycleState::Active
    }

    /// Move to `to`, or report the invalid transition.
    pub fn advance(&mut self, to: LifecycleState) -> Result<(), LifecycleError> {
        if !self.state.can_advance_to(to) {
            return Err(LifecycleError {
                from: self.state,
                to,
            });
        }
        log::debug!("Lifecycle {:?} -> {:?}", self.state, to);
        self.state = to;
        Ok(())
    }
}
