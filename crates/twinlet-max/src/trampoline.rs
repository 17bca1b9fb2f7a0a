//! Raw entry points Max calls.
//!
//! One method per message kind serves every inlet; `proxy_getinlet` says
//! which one fired.

use std::ffi::{c_long, c_short, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};

use twinlet_core::{Message, SampleFormat};

use crate::handle::symbol_from_raw;
use crate::object::MaxObject;
use crate::sys::{t_atom_float, t_atom_long, t_object, t_symbol};

unsafe fn dispatch(object: *mut t_object, message: Message) {
    let _ = catch_unwind(AssertUnwindSafe(|| unsafe {
        let Some(class) = MaxObject::class_of(object) else {
            return;
        };
        let Ok(index) = usize::try_from(class.api.proxy_getinlet(object)) else {
            return;
        };
        MaxObject::enter(object, |instance| {
            let _ = instance.dispatch_proxy(index, message);
        });
    }));
}

pub(crate) unsafe extern "C" fn bang_in(object: *mut t_object) {
    dispatch(object, Message::Bang);
}

pub(crate) unsafe extern "C" fn int_in(object: *mut t_object, value: t_atom_long) {
    dispatch(object, Message::Int(value));
}

pub(crate) unsafe extern "C" fn float_in(object: *mut t_object, value: t_atom_float) {
    dispatch(object, Message::Float(value));
}

pub(crate) unsafe extern "C" fn symbol_in(object: *mut t_object, symbol: *mut t_symbol) {
    if let Some(symbol) = symbol_from_raw(symbol) {
        dispatch(object, Message::Symbol(symbol));
    }
}

/// `dsp64` method: prepare storage and add the perform routine.
pub(crate) unsafe extern "C" fn dsp64(
    object: *mut t_object,
    dsp64: *mut t_object,
    _count: *mut c_short,
    _sample_rate: f64,
    max_vector_size: c_long,
    _flags: c_long,
) {
    let _ = catch_unwind(AssertUnwindSafe(|| unsafe {
        let prepared = MaxObject::enter(object, |instance| {
            if !instance.ports().has_signal() {
                return false;
            }
            instance.prepare_signal(SampleFormat::Float64, max_vector_size.max(0) as usize);
            true
        });
        if prepared != Some(true) {
            return;
        }
        if let Some(class) = MaxObject::class_of(object) {
            class.api.dsp_add64(dsp64, object, perform64);
        }
    }));
}

/// Perform routine: render one block in `f64`.
#[allow(clippy::too_many_arguments)]
pub(crate) unsafe extern "C" fn perform64(
    object: *mut t_object,
    _dsp64: *mut t_object,
    ins: *mut *mut f64,
    num_ins: c_long,
    outs: *mut *mut f64,
    num_outs: c_long,
    sample_frames: c_long,
    _flags: c_long,
    _user_param: *mut c_void,
) {
    let _ = catch_unwind(AssertUnwindSafe(|| unsafe {
        let inputs = input_pointers(ins, num_ins);
        let outputs = pointers(outs, num_outs);
        MaxObject::enter(object, |instance| {
            instance.render_f64(inputs, outputs, sample_frames.max(0) as usize);
        });
    }));
}

unsafe fn pointers<'a>(list: *mut *mut f64, len: c_long) -> &'a [*mut f64] {
    if list.is_null() || len <= 0 {
        return &[];
    }
    std::slice::from_raw_parts(list, len as usize)
}

/// The host's input list viewed as read-only channel pointers, in place.
unsafe fn input_pointers<'a>(list: *mut *mut f64, len: c_long) -> &'a [*const f64] {
    if list.is_null() || len <= 0 {
        return &[];
    }
    std::slice::from_raw_parts(list as *const *const f64, len as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_pointers_view_host_list_in_place() {
        let mut left = [1.0f64; 4];
        let mut right = [2.0f64; 4];
        let mut list = [left.as_mut_ptr(), right.as_mut_ptr()];

        let inputs = unsafe { input_pointers(list.as_mut_ptr(), 2) };
        assert_eq!(inputs.as_ptr() as usize, list.as_ptr() as usize);
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0], left.as_ptr());
        assert_eq!(inputs[1], right.as_ptr());
    }

    #[test]
    fn test_empty_or_null_lists_are_empty() {
        let mut list = [std::ptr::null_mut::<f64>(); 2];
        assert!(unsafe { input_pointers(std::ptr::null_mut(), 2) }.is_empty());
        assert!(unsafe { input_pointers(list.as_mut_ptr(), 0) }.is_empty());
        assert!(unsafe { pointers(list.as_mut_ptr(), -1) }.is_empty());
    }
}
