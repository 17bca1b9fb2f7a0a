//! Max/MSP C types used by the binding.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_long, c_short, c_void};

pub type t_atom_long = i64;
pub type t_atom_float = f64;
pub type t_max_err = isize;
pub type t_ptr_int = isize;

#[repr(C)]
pub struct t_symbol {
    pub s_name: *const c_char,
    pub s_thing: *mut c_void,
}

/// Header of every Max object.
#[repr(C)]
pub struct t_object {
    pub o_messlist: *mut c_void,
    pub o_magic: t_ptr_int,
    pub o_inlet: *mut c_void,
    pub o_outlet: *mut c_void,
}

/// Header of every MSP object. `dsp_setup` fills it in.
#[repr(C)]
pub struct t_pxobject {
    pub z_ob: t_object,
    pub z_in: c_long,
    pub z_proxy: *mut c_void,
    pub z_disabled: c_long,
    pub z_count: c_short,
    pub z_misc: c_short,
}

#[repr(C)]
pub struct t_class {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union t_word {
    pub w_long: t_atom_long,
    pub w_float: t_atom_float,
    pub w_sym: *mut t_symbol,
    pub w_obj: *mut c_void,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct t_atom {
    pub a_type: c_short,
    pub a_w: t_word,
}

// e_max_atomtypes
pub const A_NOTHING: c_short = 0;
pub const A_LONG: c_short = 1;
pub const A_FLOAT: c_short = 2;
pub const A_SYM: c_short = 3;
pub const A_GIMME: c_short = 8;
pub const A_CANT: c_short = 9;

/// Namespace of classes instantiable in a patcher box.
pub const CLASS_BOX: &str = "box";

pub type method = unsafe extern "C" fn() -> *mut c_void;

pub type NewMethod = unsafe extern "C" fn(*mut t_symbol, c_long, *mut t_atom) -> *mut c_void;
pub type FreeMethod = unsafe extern "C" fn(*mut t_object);
pub type BangMethod = unsafe extern "C" fn(*mut t_object);
pub type IntMethod = unsafe extern "C" fn(*mut t_object, t_atom_long);
pub type FloatMethod = unsafe extern "C" fn(*mut t_object, t_atom_float);
pub type SymbolMethod = unsafe extern "C" fn(*mut t_object, *mut t_symbol);
pub type Dsp64Method =
    unsafe extern "C" fn(*mut t_object, *mut t_object, *mut c_short, f64, c_long, c_long);
pub type Perform64Method = unsafe extern "C" fn(
    *mut t_object,
    *mut t_object,
    *mut *mut f64,
    c_long,
    *mut *mut f64,
    c_long,
    c_long,
    c_long,
    *mut c_void,
);
