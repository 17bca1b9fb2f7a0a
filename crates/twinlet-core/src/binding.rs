//! The seam between the core and a concrete host.
//!
//! The registry and dispatch core only ever talk to a [`HostBinding`]. Each
//! host crate provides one implementation, chosen at build time through the
//! crate it is exported with.

use crate::error::{PortError, PortResult};
use crate::port::{HostHandle, Inlet, MessageKind, Outlet, PassiveStorage};

/// How host events find their inlet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStrategy {
    /// One entry point per (kind, slot), registered with the class.
    /// Slot `k` always addresses `inlets[k - 1]`.
    NumberedSlots,
    /// One entry point per kind; the host reports which proxy fired.
    ProxyIndex,
}

/// Everything a binding needs to create the host side of an inlet.
#[derive(Debug, Clone, Copy)]
pub struct InletRequest<'a> {
    pub index: usize,
    pub id: &'a str,
    pub kind: MessageKind,
    /// Numbered slot, for [`DispatchStrategy::NumberedSlots`] bindings.
    pub slot: Option<usize>,
    pub passive: Option<&'a PassiveStorage>,
}

#[derive(Debug, Clone, Copy)]
pub struct OutletRequest<'a> {
    pub index: usize,
    pub id: &'a str,
    pub kind: MessageKind,
}

/// Host-specific port creation and layout.
pub trait HostBinding {
    fn strategy(&self) -> DispatchStrategy;

    /// Kind of the numbered slot an inlet of `kind` is bound to.
    ///
    /// Hosts without a native message for a kind map it onto one they have.
    fn slot_kind(&self, kind: MessageKind) -> MessageKind {
        kind
    }

    /// Create the host inlet, or return `None` to defer it to [`layout`](Self::layout).
    fn bind_inlet(&self, request: &InletRequest<'_>) -> PortResult<Option<HostHandle>>;

    /// Create the host outlet, or return `None` to defer it to [`layout`](Self::layout).
    fn bind_outlet(&self, request: &OutletRequest<'_>) -> PortResult<Option<HostHandle>>;

    /// Finalize host ports once every port is declared.
    fn layout(&self, ports: &mut LayoutPorts<'_>) -> PortResult<()> {
        let _ = ports;
        Ok(())
    }

    /// Print to the host console.
    fn post(&self, message: &str);
}

/// Mutable view of the declared ports during layout.
///
/// Ports themselves stay immutable; layout may only attach host handles
/// to ports that don't have one yet.
pub struct LayoutPorts<'a> {
    inlets: &'a mut [Inlet],
    outlets: &'a mut [Outlet],
    in_channels: usize,
    out_channels: usize,
}

impl<'a> LayoutPorts<'a> {
    pub(crate) fn new(
        inlets: &'a mut [Inlet],
        outlets: &'a mut [Outlet],
        in_channels: usize,
        out_channels: usize,
    ) -> Self {
        Self {
            inlets,
            outlets,
            in_channels,
            out_channels,
        }
    }

    pub fn inlets(&self) -> &[Inlet] {
        self.inlets
    }

    pub fn outlets(&self) -> &[Outlet] {
        self.outlets
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn has_signal(&self) -> bool {
        self.in_channels + self.out_channels > 0
    }

    pub fn attach_inlet(&mut self, index: usize, handle: HostHandle) -> PortResult<()> {
        match self.inlets.get_mut(index) {
            Some(inlet) if !inlet.has_host_handle() => {
                inlet.attach(handle);
                Ok(())
            }
            Some(_) => Err(PortError::InvalidState(format!(
                "inlet {} already has a host object",
                index
            ))),
            None => Err(PortError::InvalidState(format!("no inlet {}", index))),
        }
    }

    pub fn attach_outlet(&mut self, index: usize, handle: HostHandle) -> PortResult<()> {
        match self.outlets.get_mut(index) {
            Some(outlet) if !outlet.has_host_handle() => {
                outlet.attach(handle);
                Ok(())
            }
            Some(_) => Err(PortError::InvalidState(format!(
                "outlet {} already has a host object",
                index
            ))),
            None => Err(PortError::InvalidState(format!("no outlet {}", index))),
        }
    }
}
