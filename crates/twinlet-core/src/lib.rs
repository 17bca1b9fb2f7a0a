//! Twinlet Core - host-agnostic abstractions for Pd and Max externals.
//!
//! This crate provides the pieces shared by every host binding:
//!
//! - [`External`]: the trait an object implements
//! - [`PortRegistry`], [`Inlet`], [`Outlet`]: ordered, typed ports
//! - [`DispatchTable`] and [`deliver`]: routing host events to receivers
//! - [`SignalStorage`] and [`Buffer`]: building each render block
//! - [`HostBinding`]: the seam a host crate implements
//! - [`ExternalInstance`] / [`ObjectInstance`]: the lifecycle-driving wrapper
//!   a host object record stores
//!
//! The core never names a host type. `twinlet-pd` and `twinlet-max`
//! implement [`HostBinding`] and [`PortHandle`] for their hosts.

pub mod atom;
pub mod binding;
pub mod buffer;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod external;
pub mod instance;
pub mod lifecycle;
pub mod port;
pub mod registry;
pub mod sample;
pub mod signal;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use atom::{Atom, Symbol};
pub use binding::{DispatchStrategy, HostBinding, InletRequest, LayoutPorts, OutletRequest};
pub use buffer::Buffer;
pub use config::ClassConfig;
pub use dispatch::{deliver, Delivery, DispatchTable};
pub use error::{
    DispatchError, ExternalError, ExternalResult, LifecycleError, PortError, PortResult,
};
pub use external::External;
pub use instance::{ExternalInstance, ObjectInstance};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use port::{
    HostHandle, Inlet, Message, MessageKind, Outlet, PassiveFloat, PassiveStorage,
    PassiveSymbol, PortHandle,
};
pub use registry::PortRegistry;
pub use sample::{Sample, SampleFormat};
pub use signal::{perform_arg_count, PerformArgs, PerformWord, SignalStorage};
pub use types::{DEFAULT_BLOCK_SIZE, DEFAULT_MAX_CONTROL_INLETS, MAX_CHANNELS};
