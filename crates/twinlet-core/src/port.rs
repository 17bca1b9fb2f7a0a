//! Inlets, outlets and the messages that flow through them.
//!
//! A port is immutable once created: its index, identifier and kind are fixed
//! at declaration time. The only thing that may change afterwards is its host
//! handle, which a deferred-layout host attaches exactly once.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::atom::Symbol;

// =============================================================================
// Message kinds
// =============================================================================

/// Kind of data a port carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Bang,
    Int,
    Float,
    Symbol,
    /// Per-sample audio, processed once per render block.
    Signal,
    /// Generic discrete outlet with no enforced sub-kind.
    Control,
}

impl MessageKind {
    /// Host selector name for this kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bang => "bang",
            Self::Int => "int",
            Self::Float => "float",
            Self::Symbol => "symbol",
            Self::Signal => "signal",
            Self::Control => "control",
        }
    }

    /// Returns true for signal ports.
    pub const fn is_signal(&self) -> bool {
        matches!(self, Self::Signal)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single discrete host event.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Bang,
    Int(i64),
    Float(f64),
    Symbol(Symbol),
}

impl Message {
    /// The kind of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Bang => MessageKind::Bang,
            Self::Int(_) => MessageKind::Int,
            Self::Float(_) => MessageKind::Float,
            Self::Symbol(_) => MessageKind::Symbol,
        }
    }

    /// Convert a numeric message for an inlet of `kind`.
    ///
    /// Hosts without a native int message deliver floats to int inlets;
    /// those are truncated toward zero. Any other pairing returns `None`.
    pub fn coerce_to(self, kind: MessageKind) -> Option<Message> {
        match (self, kind) {
            (Self::Float(f), MessageKind::Int) => Some(Self::Int(f as i64)),
            (msg, kind) if msg.kind() == kind => Some(msg),
            _ => None,
        }
    }
}

// =============================================================================
// Host handles
// =============================================================================

/// Host-side object backing a port.
///
/// Implemented by the host crates. Dropping the handle releases the host
/// object, so a port releases its handle exactly once.
pub trait PortHandle {
    /// Emit a message through the host object.
    ///
    /// Returns false if the host object cannot carry the message.
    fn send(&self, message: &Message) -> bool {
        let _ = message;
        false
    }

    /// Copy a host-owned passive value into the external's storage.
    ///
    /// Hosts that write passive values into their own memory refresh the
    /// shared cell here. Called before every dispatch and render block.
    fn sync(&self) {}
}

/// Owned host handle stored by a port.
pub type HostHandle = Box<dyn PortHandle>;

// =============================================================================
// Passive storage
// =============================================================================

/// Float storage the host writes into directly.
///
/// Clones share the same cell: keep one in the external and hand one to
/// [`PortRegistry::add_inlet_float_passive`](crate::PortRegistry::add_inlet_float_passive).
#[derive(Clone, Default)]
pub struct PassiveFloat(Arc<AtomicU64>);

impl PassiveFloat {
    pub fn new(value: f64) -> Self {
        Self(Arc::new(AtomicU64::new(value.to_bits())))
    }

    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl fmt::Debug for PassiveFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PassiveFloat").field(&self.get()).finish()
    }
}

/// Symbol storage the host writes into directly.
#[derive(Clone, Default)]
pub struct PassiveSymbol(Arc<Mutex<Symbol>>);

impl PassiveSymbol {
    pub fn new(value: Symbol) -> Self {
        Self(Arc::new(Mutex::new(value)))
    }

    pub fn get(&self) -> Symbol {
        match self.0.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set(&self, value: Symbol) {
        match self.0.lock() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }
}

impl fmt::Debug for PassiveSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PassiveSymbol").field(&self.get()).finish()
    }
}

/// External storage bound to a passive inlet.
#[derive(Debug, Clone)]
pub enum PassiveStorage {
    Float(PassiveFloat),
    Symbol(PassiveSymbol),
}

impl PassiveStorage {
    /// Write a message into the storage.
    ///
    /// Returns false if the message kind does not fit the storage.
    pub fn store(&self, message: &Message) -> bool {
        match (self, message) {
            (Self::Float(cell), Message::Float(f)) => {
                cell.set(*f);
                true
            }
            (Self::Float(cell), Message::Int(i)) => {
                cell.set(*i as f64);
                true
            }
            (Self::Symbol(cell), Message::Symbol(s)) => {
                cell.set(s.clone());
                true
            }
            _ => false,
        }
    }
}

// =============================================================================
// Inlet
// =============================================================================

/// An inlet declared by an external.
pub struct Inlet {
    index: usize,
    id: String,
    kind: MessageKind,
    slot: Option<usize>,
    passive: Option<PassiveStorage>,
    handle: Option<HostHandle>,
}

impl Inlet {
    pub(crate) fn new(
        index: usize,
        id: String,
        kind: MessageKind,
        slot: Option<usize>,
        passive: Option<PassiveStorage>,
    ) -> Self {
        Self {
            index,
            id,
            kind,
            slot,
            passive,
            handle: None,
        }
    }

    /// Position in the inlet sequence (left to right).
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// User-visible identifier.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    #[inline]
    pub fn is_signal(&self) -> bool {
        self.kind.is_signal()
    }

    /// Numbered dispatch slot, if the host binds this inlet by slot.
    #[inline]
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    /// Returns true if the host writes into external storage for this inlet.
    #[inline]
    pub fn is_passive(&self) -> bool {
        self.passive.is_some()
    }

    pub fn passive_storage(&self) -> Option<&PassiveStorage> {
        self.passive.as_ref()
    }

    /// Returns true once a host-side inlet object exists.
    #[inline]
    pub fn has_host_handle(&self) -> bool {
        self.handle.is_some()
    }

    /// Refresh passive storage from the host.
    #[inline]
    pub(crate) fn sync_passive(&self) {
        if let (Some(_), Some(handle)) = (&self.passive, &self.handle) {
            handle.sync();
        }
    }

    pub(crate) fn attach(&mut self, handle: HostHandle) {
        debug_assert!(self.handle.is_none(), "inlet host handle attached twice");
        self.handle = Some(handle);
    }
}

impl fmt::Debug for Inlet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inlet")
            .field("index", &self.index)
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("slot", &self.slot)
            .field("passive", &self.passive.is_some())
            .field("bound", &self.handle.is_some())
            .finish()
    }
}

impl Drop for Inlet {
    fn drop(&mut self) {
        if self.handle.take().is_some() {
            log::debug!("Released inlet {} '{}'", self.index, self.id);
        }
    }
}

// =============================================================================
// Outlet
// =============================================================================

/// An outlet declared by an external.
pub struct Outlet {
    index: usize,
    id: String,
    kind: MessageKind,
    handle: Option<HostHandle>,
}

impl Outlet {
    pub(crate) fn new(index: usize, id: String, kind: MessageKind) -> Self {
        Self {
            index,
            id,
            kind,
            handle: None,
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    #[inline]
    pub fn is_signal(&self) -> bool {
        self.kind.is_signal()
    }

    #[inline]
    pub fn has_host_handle(&self) -> bool {
        self.handle.is_some()
    }

    pub fn send_bang(&self) {
        self.send(Message::Bang);
    }

    pub fn send_int(&self, value: i64) {
        self.send(Message::Int(value));
    }

    pub fn send_float(&self, value: f64) {
        self.send(Message::Float(value));
    }

    pub fn send_symbol(&self, symbol: &Symbol) {
        self.send(Message::Symbol(symbol.clone()));
    }

    /// Emit a message, dropping it with a warning if this outlet cannot carry it.
    pub fn send(&self, message: Message) {
        if self.is_signal() {
            log::warn!(
                "Dropped {} on signal outlet {} '{}'",
                message.kind(),
                self.index,
                self.id
            );
            return;
        }
        match &self.handle {
            Some(handle) => {
                if !handle.send(&message) {
                    log::warn!(
                        "Host rejected {} on outlet {} '{}'",
                        message.kind(),
                        self.index,
                        self.id
                    );
                }
            }
            None => log::warn!(
                "Dropped {} on unbound outlet {} '{}'",
                message.kind(),
                self.index,
                self.id
            ),
        }
    }

    pub(crate) fn attach(&mut self, handle: HostHandle) {
        debug_assert!(self.handle.is_none(), "outlet host handle attached twice");
        self.handle = Some(handle);
    }
}

impl fmt::Debug for Outlet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outlet")
            .field("index", &self.index)
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("bound", &self.handle.is_some())
            .finish()
    }
}

impl Drop for Outlet {
    fn drop(&mut self) {
        if self.handle.take().is_some() {
            log::debug!("Released outlet {} '{}'", self.index, self.id);
        }
    }
}
