//! Pd C types used by the binding.
//!
//! Only the layouts the binding touches are declared. Structs the binding
//! reads through a pointer (`t_signal`) declare just their leading fields.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_short, c_uint, c_void};

/// Pointer-sized integer used by the DSP chain.
pub type t_int = isize;
pub type t_float = f32;
pub type t_floatarg = f32;
pub type t_sample = f32;

#[repr(C)]
pub struct t_symbol {
    pub s_name: *const c_char,
    pub s_thing: *mut c_void,
    pub s_next: *mut t_symbol,
}

/// Leading fields of Pd's `t_text`, which every patchable object starts with.
#[repr(C)]
pub struct t_object {
    pub te_pd: *mut c_void,
    pub te_binbuf: *mut c_void,
    pub te_outlet: *mut c_void,
    pub te_inlet: *mut c_void,
    pub te_xpix: c_short,
    pub te_ypix: c_short,
    pub te_width: c_short,
    pub te_type: c_uint,
}

#[repr(C)]
pub struct t_class {
    _private: [u8; 0],
}

#[repr(C)]
pub struct t_inlet {
    _private: [u8; 0],
}

#[repr(C)]
pub struct t_outlet {
    _private: [u8; 0],
}

/// Leading fields of a DSP signal descriptor.
#[repr(C)]
pub struct t_signal {
    pub s_n: c_int,
    pub s_vec: *mut t_sample,
    pub s_sr: t_float,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union t_word {
    pub w_float: t_float,
    pub w_symbol: *mut t_symbol,
    pub w_gpointer: *mut c_void,
    pub w_index: c_int,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct t_atom {
    pub a_type: c_int,
    pub a_w: t_word,
}

// t_atomtype
pub const A_NULL: c_int = 0;
pub const A_FLOAT: c_int = 1;
pub const A_SYMBOL: c_int = 2;
pub const A_GIMME: c_int = 10;
pub const A_CANT: c_int = 11;

/// Class flag: no implicit leftmost inlet. Every inlet is created explicitly.
pub const CLASS_NOINLET: c_int = 8;

pub type t_method = unsafe extern "C" fn();
pub type t_newmethod = unsafe extern "C" fn() -> *mut c_void;
pub type t_perfroutine = unsafe extern "C" fn(*mut t_int) -> *mut t_int;

/// `new` entry point for `A_GIMME` classes.
pub type NewMethod = unsafe extern "C" fn(*mut t_symbol, c_int, *mut t_atom) -> *mut c_void;
pub type FreeMethod = unsafe extern "C" fn(*mut t_object);
pub type BangMethod = unsafe extern "C" fn(*mut t_object);
pub type FloatMethod = unsafe extern "C" fn(*mut t_object, t_floatarg);
pub type SymbolMethod = unsafe extern "C" fn(*mut t_object, *mut t_symbol);
pub type DspMethod = unsafe extern "C" fn(*mut t_object, *mut *mut t_signal);
