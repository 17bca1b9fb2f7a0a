//! The subset of the Max API the binding calls.

use std::ffi::{c_long, c_void};

use crate::sys::{
    t_atom_long, t_class, t_object, t_pxobject, t_symbol, BangMethod, Dsp64Method, FloatMethod,
    FreeMethod, IntMethod, NewMethod, Perform64Method, SymbolMethod,
};

/// A class method, tagged with its argument signature.
#[derive(Clone, Copy)]
pub enum MaxMethod {
    Bang(BangMethod),
    /// One `A_LONG`.
    Int(IntMethod),
    /// One `A_FLOAT`.
    Float(FloatMethod),
    /// One `A_SYM`.
    Symbol(SymbolMethod),
    /// The `dsp64` method, registered with `A_CANT`.
    Dsp64(Dsp64Method),
}

impl std::fmt::Debug for MaxMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Bang(_) => "Bang",
            Self::Int(_) => "Int",
            Self::Float(_) => "Float",
            Self::Symbol(_) => "Symbol",
            Self::Dsp64(_) => "Dsp64",
        };
        f.write_str(name)
    }
}

/// Max entry points used by the binding.
///
/// # Safety
///
/// Pointer arguments must come from earlier calls on the same API value.
pub trait MaxApi: Send + Sync {
    /// `class_new` for an `A_GIMME` class.
    unsafe fn class_new(
        &self,
        name: &str,
        new_method: NewMethod,
        free_method: FreeMethod,
        size: usize,
    ) -> *mut t_class;

    unsafe fn class_add_method(&self, class: *mut t_class, name: &str, method: MaxMethod);

    unsafe fn class_dspinit(&self, class: *mut t_class);

    /// Register the class in the box namespace.
    unsafe fn class_register(&self, class: *mut t_class) -> bool;

    unsafe fn object_alloc(&self, class: *mut t_class) -> *mut t_object;

    /// Free an object, proxy inlets included. Runs the class free method.
    unsafe fn object_free(&self, object: *mut c_void);

    /// Proxy inlet reporting `id` through `stuffloc` when it fires.
    unsafe fn proxy_new(&self, owner: *mut t_object, id: c_long, stuffloc: *mut c_long)
        -> *mut c_void;

    /// Index of the inlet the current message arrived on.
    unsafe fn proxy_getinlet(&self, owner: *mut t_object) -> c_long;

    /// Create `signal_inlets` signal inlets on an MSP object.
    unsafe fn dsp_setup(&self, owner: *mut t_pxobject, signal_inlets: c_long);

    unsafe fn dsp_free(&self, owner: *mut t_pxobject);

    /// `None` creates a generic outlet, `Some("signal")` a signal outlet.
    unsafe fn outlet_new(&self, owner: *mut t_object, kind: Option<&str>) -> *mut c_void;

    unsafe fn outlet_delete(&self, outlet: *mut c_void);

    unsafe fn outlet_bang(&self, outlet: *mut c_void);

    unsafe fn outlet_int(&self, outlet: *mut c_void, value: t_atom_long);

    unsafe fn outlet_float(&self, outlet: *mut c_void, value: f64);

    /// Send `symbol <name>`.
    unsafe fn outlet_symbol(&self, outlet: *mut c_void, symbol: &str);

    /// Add `perform` for `owner` to the DSP chain being compiled.
    unsafe fn dsp_add64(&self, dsp64: *mut t_object, owner: *mut t_object, perform: Perform64Method);

    fn gensym(&self, name: &str) -> *mut t_symbol;

    fn post(&self, message: &str);
}
