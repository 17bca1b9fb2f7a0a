//! Host handles stored by Twinlet ports.

use std::ffi::{c_void, CStr};
use std::sync::Arc;

use twinlet_core::{Message, PortHandle, Symbol};

use crate::api::MaxApi;
use crate::sys::t_symbol;

/// A proxy inlet. Freed with `object_free`.
pub(crate) struct MaxProxy {
    api: Arc<dyn MaxApi>,
    raw: *mut c_void,
}

impl MaxProxy {
    pub(crate) fn new(api: Arc<dyn MaxApi>, raw: *mut c_void) -> Self {
        Self { api, raw }
    }
}

impl PortHandle for MaxProxy {}

impl Drop for MaxProxy {
    fn drop(&mut self) {
        // SAFETY: raw came from proxy_new on this API and is freed once.
        unsafe { self.api.object_free(self.raw) }
    }
}

pub(crate) struct MaxOutlet {
    api: Arc<dyn MaxApi>,
    raw: *mut c_void,
    signal: bool,
}

impl MaxOutlet {
    pub(crate) fn new(api: Arc<dyn MaxApi>, raw: *mut c_void, signal: bool) -> Self {
        Self { api, raw, signal }
    }
}

impl PortHandle for MaxOutlet {
    fn send(&self, message: &Message) -> bool {
        if self.signal {
            return false;
        }
        // SAFETY: raw is a live outlet owned by this handle.
        unsafe {
            match message {
                Message::Bang => self.api.outlet_bang(self.raw),
                Message::Int(i) => self.api.outlet_int(self.raw, *i),
                Message::Float(f) => self.api.outlet_float(self.raw, *f),
                Message::Symbol(s) => self.api.outlet_symbol(self.raw, s.as_str()),
            }
        }
        true
    }
}

impl Drop for MaxOutlet {
    fn drop(&mut self) {
        // SAFETY: raw came from outlet_new on this API and is deleted once.
        unsafe { self.api.outlet_delete(self.raw) }
    }
}

/// # Safety
///
/// `symbol` must be null or point to a live `t_symbol`.
pub(crate) unsafe fn symbol_from_raw(symbol: *const t_symbol) -> Option<Symbol> {
    if symbol.is_null() || (*symbol).s_name.is_null() {
        return None;
    }
    Some(Symbol::from_c_str(CStr::from_ptr((*symbol).s_name)))
}
