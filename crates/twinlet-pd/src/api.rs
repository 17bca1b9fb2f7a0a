//! The subset of the Pd C API the binding calls.
//!
//! [`PdHost`](crate::PdHost) forwards to the running Pd process. The mock
//! host implements the same trait in-process so the whole binding can be
//! exercised without Pd.

use crate::sys::{
    t_class, t_float, t_inlet, t_int, t_object, t_outlet, t_perfroutine, t_symbol, BangMethod,
    DspMethod, FloatMethod, FreeMethod, NewMethod, SymbolMethod,
};

/// A class method, tagged with its argument signature.
#[derive(Clone, Copy)]
pub enum PdMethod {
    /// No arguments.
    Bang(BangMethod),
    /// One `A_FLOAT`.
    Float(FloatMethod),
    /// One `A_SYMBOL`.
    Symbol(SymbolMethod),
    /// The `dsp` method, registered with `A_CANT`.
    Dsp(DspMethod),
}

impl std::fmt::Debug for PdMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Bang(_) => "Bang",
            Self::Float(_) => "Float",
            Self::Symbol(_) => "Symbol",
            Self::Dsp(_) => "Dsp",
        };
        f.write_str(name)
    }
}

/// Pd entry points used by the binding.
///
/// # Safety
///
/// Pointer arguments must come from earlier calls on the same API value.
pub trait PdApi: Send + Sync {
    /// `class_new` for an `A_GIMME` class with `CLASS_NOINLET`.
    unsafe fn class_new(
        &self,
        name: &str,
        new_method: NewMethod,
        free_method: FreeMethod,
        size: usize,
    ) -> *mut t_class;

    unsafe fn class_add_method(&self, class: *mut t_class, selector: &str, method: PdMethod);

    /// Allocate a zeroed object of the class size.
    unsafe fn pd_new(&self, class: *mut t_class) -> *mut t_object;

    /// Run the class free method, release remaining ports and free the memory.
    unsafe fn pd_free(&self, object: *mut t_object);

    /// Inlet that forwards `kind` messages to the owner as `selector`.
    unsafe fn inlet_new(&self, owner: *mut t_object, kind: &str, selector: &str) -> *mut t_inlet;

    /// Passive inlet writing floats into `cell`.
    unsafe fn float_inlet_new(&self, owner: *mut t_object, cell: *mut t_float) -> *mut t_inlet;

    /// Passive inlet writing symbols into `cell`.
    unsafe fn symbol_inlet_new(
        &self,
        owner: *mut t_object,
        cell: *mut *mut t_symbol,
    ) -> *mut t_inlet;

    unsafe fn inlet_free(&self, inlet: *mut t_inlet);

    /// `None` creates a control outlet, `Some("signal")` a signal outlet.
    unsafe fn outlet_new(&self, owner: *mut t_object, kind: Option<&str>) -> *mut t_outlet;

    unsafe fn outlet_free(&self, outlet: *mut t_outlet);

    unsafe fn outlet_bang(&self, outlet: *mut t_outlet);

    unsafe fn outlet_float(&self, outlet: *mut t_outlet, value: t_float);

    unsafe fn outlet_symbol(&self, outlet: *mut t_outlet, symbol: &str);

    /// Append `perform` with `args` to the DSP chain. Pd copies `args`.
    unsafe fn dsp_add(&self, perform: t_perfroutine, args: &mut [t_int]);

    fn gensym(&self, name: &str) -> *mut t_symbol;

    fn post(&self, message: &str);
}
