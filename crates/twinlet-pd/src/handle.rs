//! Host handles stored by Twinlet ports.
//!
//! Dropping a handle frees the Pd object behind it.

use std::cell::{Cell, UnsafeCell};
use std::ffi::CStr;
use std::sync::Arc;

use twinlet_core::{Message, PassiveFloat, PassiveSymbol, PortHandle, Symbol};

use crate::api::PdApi;
use crate::sys::{t_float, t_inlet, t_outlet, t_symbol};

/// An active or signal inlet.
pub(crate) struct PdInlet {
    api: Arc<dyn PdApi>,
    raw: *mut t_inlet,
}

impl PdInlet {
    pub(crate) fn new(api: Arc<dyn PdApi>, raw: *mut t_inlet) -> Self {
        Self { api, raw }
    }
}

impl PortHandle for PdInlet {}

impl Drop for PdInlet {
    fn drop(&mut self) {
        // SAFETY: raw came from inlet_new on this API and is freed once.
        unsafe { self.api.inlet_free(self.raw) }
    }
}

/// Passive float inlet. Pd writes into `cell`; `sync` publishes changes.
pub(crate) struct PdPassiveFloat {
    // Dropped first: the inlet must go before the cell it points into.
    _inlet: PdInlet,
    cell: Box<UnsafeCell<t_float>>,
    last: Cell<t_float>,
    storage: PassiveFloat,
}

impl PdPassiveFloat {
    /// Create the inlet over a fresh cell seeded from `storage`.
    pub(crate) fn create(
        api: Arc<dyn PdApi>,
        owner: *mut crate::sys::t_object,
        storage: PassiveFloat,
    ) -> Option<Self> {
        let initial = storage.get() as t_float;
        let cell = Box::new(UnsafeCell::new(initial));
        // SAFETY: the cell is boxed, so its address is stable until the
        // inlet is freed.
        let raw = unsafe { api.float_inlet_new(owner, cell.get()) };
        if raw.is_null() {
            return None;
        }
        Some(Self {
            _inlet: PdInlet::new(api, raw),
            cell,
            last: Cell::new(initial),
            storage,
        })
    }
}

impl PortHandle for PdPassiveFloat {
    fn sync(&self) {
        // SAFETY: Pd only writes the cell from the scheduler thread, which
        // is also the thread calling sync.
        let value = unsafe { *self.cell.get() };
        if value.to_bits() != self.last.get().to_bits() {
            self.last.set(value);
            self.storage.set(value as f64);
        }
    }
}

/// Passive symbol inlet over a `t_symbol *` cell.
pub(crate) struct PdPassiveSymbol {
    _inlet: PdInlet,
    cell: Box<UnsafeCell<*mut t_symbol>>,
    last: Cell<*mut t_symbol>,
    storage: PassiveSymbol,
}

impl PdPassiveSymbol {
    pub(crate) fn create(
        api: Arc<dyn PdApi>,
        owner: *mut crate::sys::t_object,
        storage: PassiveSymbol,
    ) -> Option<Self> {
        let initial = api.gensym(storage.get().as_str());
        let cell = Box::new(UnsafeCell::new(initial));
        // SAFETY: see PdPassiveFloat::create.
        let raw = unsafe { api.symbol_inlet_new(owner, cell.get()) };
        if raw.is_null() {
            return None;
        }
        Some(Self {
            _inlet: PdInlet::new(api, raw),
            cell,
            last: Cell::new(initial),
            storage,
        })
    }
}

impl PortHandle for PdPassiveSymbol {
    fn sync(&self) {
        // SAFETY: as for floats. Pd symbols are interned and never freed,
        // so pointer equality is symbol equality.
        let symbol = unsafe { *self.cell.get() };
        if symbol != self.last.get() {
            self.last.set(symbol);
            if let Some(symbol) = unsafe { symbol_from_raw(symbol) } {
                self.storage.set(symbol);
            }
        }
    }
}

/// Read a Pd symbol into a [`Symbol`].
///
/// # Safety
///
/// `symbol` must be null or point to a live `t_symbol`.
pub(crate) unsafe fn symbol_from_raw(symbol: *const t_symbol) -> Option<Symbol> {
    if symbol.is_null() || (*symbol).s_name.is_null() {
        return None;
    }
    Some(Symbol::from_c_str(CStr::from_ptr((*symbol).s_name)))
}

/// A control or signal outlet.
pub(crate) struct PdOutlet {
    api: Arc<dyn PdApi>,
    raw: *mut t_outlet,
    signal: bool,
}

impl PdOutlet {
    pub(crate) fn new(api: Arc<dyn PdApi>, raw: *mut t_outlet, signal: bool) -> Self {
        Self { api, raw, signal }
    }
}

impl PortHandle for PdOutlet {
    fn send(&self, message: &Message) -> bool {
        if self.signal {
            return false;
        }
        // SAFETY: raw is a live outlet owned by this handle.
        unsafe {
            match message {
                Message::Bang => self.api.outlet_bang(self.raw),
                // Pd has no integer message.
                Message::Int(i) => self.api.outlet_float(self.raw, *i as t_float),
                Message::Float(f) => self.api.outlet_float(self.raw, *f as t_float),
                Message::Symbol(s) => self.api.outlet_symbol(self.raw, s.as_str()),
            }
        }
        true
    }
}

impl Drop for PdOutlet {
    fn drop(&mut self) {
        // SAFETY: raw came from outlet_new on this API and is freed once.
        unsafe { self.api.outlet_free(self.raw) }
    }
}
