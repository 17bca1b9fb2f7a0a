//! The Max object record behind every instance.

use std::ffi::c_long;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::{addr_of, addr_of_mut};
use std::sync::Arc;

use twinlet_core::{Atom, ObjectInstance};

use crate::class::MaxClass;
use crate::handle::symbol_from_raw;
use crate::sys::{t_atom, t_object, t_pxobject, A_FLOAT, A_LONG, A_SYM};

/// Memory layout Max allocates for each instance.
#[repr(C)]
pub struct MaxObject {
    pub(crate) header: t_pxobject,
    /// Written by proxies when a message arrives on them.
    pub(crate) proxy_inlet: c_long,
    pub(crate) class: *const MaxClass,
    /// `dsp_setup` ran, so `dsp_free` must run first on free.
    pub(crate) dsp: bool,
    /// Set while a message or perform call is inside the instance.
    pub(crate) busy: bool,
    pub(crate) instance: Option<Box<dyn ObjectInstance>>,
}

struct Entered(*mut bool);

impl Drop for Entered {
    fn drop(&mut self) {
        // SAFETY: the flag lives in the record, which outlives the call.
        unsafe { *self.0 = false }
    }
}

impl MaxObject {
    /// # Safety
    ///
    /// `object` must point to an initialized `MaxObject`.
    pub(crate) unsafe fn from_raw<'a>(object: *mut t_object) -> &'a mut MaxObject {
        &mut *(object as *mut MaxObject)
    }

    /// The class, read through the raw record so no borrow of the whole
    /// record is created.
    ///
    /// # Safety
    ///
    /// `object` must be null or point to an initialized `MaxObject`.
    pub(crate) unsafe fn class_of<'a>(object: *mut t_object) -> Option<&'a MaxClass> {
        if object.is_null() {
            return None;
        }
        (*addr_of!((*(object as *const MaxObject)).class)).as_ref()
    }

    /// Run `f` on the instance. A call arriving while another one is
    /// still inside the instance, such as an outlet patched back into
    /// this object, is dropped with a console message.
    ///
    /// # Safety
    ///
    /// As for [`class_of`](Self::class_of).
    pub(crate) unsafe fn enter<R>(
        object: *mut t_object,
        f: impl FnOnce(&mut dyn ObjectInstance) -> R,
    ) -> Option<R> {
        if object.is_null() {
            return None;
        }
        let record = object as *mut MaxObject;
        let busy = addr_of_mut!((*record).busy);
        if *busy {
            log::warn!("Dropped a message that re-entered a busy object");
            if let Some(class) = Self::class_of(object) {
                class
                    .api
                    .post(&format!("{}: recursive message dropped", class.name()));
            }
            return None;
        }
        let instance = (*addr_of_mut!((*record).instance)).as_deref_mut()?;
        *busy = true;
        let _entered = Entered(busy);
        Some(f(instance))
    }

    pub(crate) fn class(&self) -> Option<&MaxClass> {
        // SAFETY: the record holds a strong count until free_object.
        unsafe { self.class.as_ref() }
    }
}

/// Free method registered with the class.
pub(crate) unsafe extern "C" fn free_object(object: *mut t_object) {
    let _ = catch_unwind(AssertUnwindSafe(|| unsafe {
        let record = MaxObject::from_raw(object);
        if record.dsp {
            if let Some(class) = record.class() {
                class.api.dsp_free(object as *mut t_pxobject);
            }
            record.dsp = false;
        }
        if let Some(mut instance) = record.instance.take() {
            instance.teardown();
        }
        let class = std::mem::replace(&mut record.class, std::ptr::null());
        if !class.is_null() {
            drop(Arc::from_raw(class));
        }
    }));
}

/// Convert creation arguments. Integers become floats.
///
/// # Safety
///
/// `argv` must be null or point to `argc` atoms.
pub(crate) unsafe fn atoms_from_raw(argc: c_long, argv: *const t_atom) -> Vec<Atom> {
    if argv.is_null() || argc <= 0 {
        return Vec::new();
    }
    std::slice::from_raw_parts(argv, argc as usize)
        .iter()
        .filter_map(|atom| match atom.a_type {
            A_LONG => Some(Atom::Float(atom.a_w.w_long as f64)),
            A_FLOAT => Some(Atom::Float(atom.a_w.w_float)),
            A_SYM => symbol_from_raw(atom.a_w.w_sym).map(Atom::Symbol),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::{t_symbol, t_word, A_NOTHING};

    #[test]
    fn test_atoms_from_raw_converts_longs() {
        let mut symbol = t_symbol {
            s_name: c"ramp".as_ptr(),
            s_thing: std::ptr::null_mut(),
        };
        let atoms = [
            t_atom {
                a_type: A_LONG,
                a_w: t_word { w_long: 3 },
            },
            t_atom {
                a_type: A_FLOAT,
                a_w: t_word { w_float: 0.25 },
            },
            t_atom {
                a_type: A_SYM,
                a_w: t_word { w_sym: &mut symbol },
            },
            t_atom {
                a_type: A_NOTHING,
                a_w: t_word { w_long: 0 },
            },
        ];
        let args = unsafe { atoms_from_raw(atoms.len() as c_long, atoms.as_ptr()) };
        assert_eq!(args.len(), 3);
        assert_eq!(args[0].float(), 3.0);
        assert_eq!(args[1].float(), 0.25);
        assert_eq!(args[2].symbol().map(|s| s.as_str()), Some("ramp"));
    }
}
