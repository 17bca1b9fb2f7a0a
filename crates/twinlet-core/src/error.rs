//! Error types for the Twinlet framework.
//!
//! None of these errors ever cross into a host: host entry points turn them
//! into log output and console posts, then return normally.

use std::fmt;

use crate::lifecycle::LifecycleState;
use crate::port::MessageKind;

/// Errors raised while declaring or laying out ports.
#[derive(Debug, Clone, PartialEq)]
pub enum PortError {
    /// More active inlets than the host's numbered dispatch slots can address.
    ConfigurationOverflow {
        /// Highest slot number the class provisions.
        capacity: usize,
        /// Slot number the new inlet would have needed.
        requested: usize,
    },
    /// Signal ports were requested after discrete ports were declared.
    SignalAfterControl,
    /// More signal channels than the render buffer can carry.
    TooManyChannels { requested: usize, max: usize },
    /// Ports can no longer be declared (e.g. after layout).
    InvalidState(String),
    /// The host refused to create a host-side port object.
    HostRefused(String),
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigurationOverflow {
                capacity,
                requested,
            } => write!(
                f,
                "Configuration overflow: inlet needs dispatch slot {} but only {} are provisioned",
                requested, capacity
            ),
            Self::SignalAfterControl => {
                write!(f, "Signal ports must be declared before control ports")
            }
            Self::TooManyChannels { requested, max } => write!(
                f,
                "{} signal channels requested, but at most {} are supported",
                requested, max
            ),
            Self::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Self::HostRefused(msg) => write!(f, "Host refused port: {}", msg),
        }
    }
}

impl std::error::Error for PortError {}

/// Result type for port declaration.
pub type PortResult<T> = Result<T, PortError>;

/// Reasons an incoming host event was dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// No inlet is registered for this numbered slot.
    UnknownSlot { kind: MessageKind, slot: usize },
    /// The resolved inlet index is outside the inlet sequence.
    UnknownInlet(usize),
    /// The inlet's kind does not match the delivered message.
    KindMismatch {
        expected: MessageKind,
        got: MessageKind,
    },
    /// The instance is not accepting events.
    NotActive(LifecycleState),
    /// A numbered slot resolved to a passive inlet, which the host feeds directly.
    PassiveInlet(usize),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSlot { kind, slot } => {
                write!(f, "No inlet bound to {} slot {}", kind, slot)
            }
            Self::UnknownInlet(index) => write!(f, "No inlet at index {}", index),
            Self::KindMismatch { expected, .. } => write!(f, "Inlet expects {}", expected),
            Self::NotActive(state) => write!(f, "Instance not active ({:?})", state),
            Self::PassiveInlet(index) => write!(f, "Inlet {} is passive", index),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Invalid lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleError {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid lifecycle transition {:?} -> {:?}", self.from, self.to)
    }
}

impl std::error::Error for LifecycleError {}

/// Errors that can occur while constructing an external.
#[derive(Debug)]
pub enum ExternalError {
    /// Port declaration or layout failed.
    Port(PortError),
    /// Lifecycle state machine was driven out of order.
    Lifecycle(LifecycleError),
    /// The external's own `setup()` rejected its creation arguments.
    Setup(String),
}

impl fmt::Display for ExternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Port(e) => write!(f, "Port error: {}", e),
            Self::Lifecycle(e) => write!(f, "Lifecycle error: {}", e),
            Self::Setup(msg) => write!(f, "Setup failed: {}", msg),
        }
    }
}

impl std::error::Error for ExternalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Port(e) => Some(e),
            Self::Lifecycle(e) => Some(e),
            Self::Setup(_) => None,
        }
    }
}

impl From<PortError> for ExternalError {
    fn from(e: PortError) -> Self {
        Self::Port(e)
    }
}

impl From<LifecycleError> for ExternalError {
    fn from(e: LifecycleError) -> Self {
        Self::Lifecycle(e)
    }
}

/// Result type for external construction.
pub type ExternalResult<T> = Result<T, ExternalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mismatch_message() {
        let err = DispatchError::KindMismatch {
            expected: MessageKind::Float,
            got: MessageKind::Bang,
        };
        assert_eq!(err.to_string(), "Inlet expects float");
    }

    #[test]
    fn test_port_error_converts() {
        let err: ExternalError = PortError::SignalAfterControl.into();
        assert!(matches!(err, ExternalError::Port(PortError::SignalAfterControl)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
