//! The Pd object record behind every instance.

use std::ffi::c_int;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::{addr_of, addr_of_mut};
use std::sync::Arc;

use twinlet_core::{Atom, ObjectInstance};

use crate::class::PdClass;
use crate::handle::symbol_from_raw;
use crate::sys::{t_atom, t_object, A_FLOAT, A_SYMBOL};

/// Memory layout Pd allocates for each instance.
///
/// Pd owns the allocation; the Rust fields are written right after
/// `pd_new` and dropped in [`free_object`].
#[repr(C)]
pub struct PdObject {
    pub(crate) header: t_object,
    /// Strong reference to the class, from `Arc::into_raw`.
    pub(crate) class: *const PdClass,
    /// Length of this object's perform argument list.
    pub(crate) perform_len: usize,
    /// A call into the instance is running.
    pub(crate) busy: bool,
    pub(crate) instance: Option<Box<dyn ObjectInstance>>,
}

/// Clears the busy flag when the call ends, unwinding included.
struct Entered(*mut bool);

impl Drop for Entered {
    fn drop(&mut self) {
        // SAFETY: the flag lives in the record, which outlives the call.
        unsafe { *self.0 = false }
    }
}

impl PdObject {
    /// # Safety
    ///
    /// `object` must point to an initialized `PdObject`.
    pub(crate) unsafe fn from_raw<'a>(object: *mut t_object) -> &'a mut PdObject {
        &mut *(object as *mut PdObject)
    }

    /// # Safety
    ///
    /// As for [`from_raw`](Self::from_raw).
    #[cfg(any(test, feature = "mock"))]
    pub(crate) unsafe fn instance_mut<'a>(
        object: *mut t_object,
    ) -> Option<&'a mut Box<dyn ObjectInstance>> {
        if object.is_null() {
            return None;
        }
        Self::from_raw(object).instance.as_mut()
    }

    /// Run `f` on the instance unless a call into it is already running.
    ///
    /// An outlet wired back into the same object re-enters it while the
    /// outer call still holds the instance. That message is dropped and
    /// reported on the console. Only the flag and the instance field are
    /// touched, never the whole record.
    ///
    /// # Safety
    ///
    /// `object` must be null or point to an initialized `PdObject`.
    pub(crate) unsafe fn enter<R>(
        object: *mut t_object,
        f: impl FnOnce(&mut dyn ObjectInstance) -> R,
    ) -> Option<R> {
        if object.is_null() {
            return None;
        }
        let record = object as *mut PdObject;
        let busy = addr_of_mut!((*record).busy);
        if *busy {
            log::warn!("Dropped a message that re-entered a busy object");
            if let Some(class) = (*addr_of!((*record).class)).as_ref() {
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

    /// Length of the perform argument list, read without borrowing the record.
    ///
    /// # Safety
    ///
    /// As for [`from_raw`](Self::from_raw).
    pub(crate) unsafe fn perform_len(object: *mut t_object) -> usize {
        addr_of!((*(object as *const PdObject)).perform_len).read()
    }

    /// The class, if the record was fully initialized.
    pub(crate) fn class(&self) -> Option<&PdClass> {
        // SAFETY: the record holds a strong count until free_object.
        unsafe { self.class.as_ref() }
    }
}

/// Free method registered with the class.
///
/// Tears the instance down, which frees its inlets and outlets, then
/// releases the record's reference to the class.
pub(crate) unsafe extern "C" fn free_object(object: *mut t_object) {
    let _ = catch_unwind(AssertUnwindSafe(|| unsafe {
        let record = PdObject::from_raw(object);
        if let Some(mut instance) = record.instance.take() {
            instance.teardown();
        }
        let class = std::mem::replace(&mut record.class, std::ptr::null());
        if !class.is_null() {
            drop(Arc::from_raw(class));
        }
    }));
}

/// Convert creation arguments. Atoms of other types are skipped.
///
/// # Safety
///
/// `argv` must be null or point to `argc` atoms.
pub(crate) unsafe fn atoms_from_raw(argc: c_int, argv: *const t_atom) -> Vec<Atom> {
    if argv.is_null() || argc <= 0 {
        return Vec::new();
    }
    std::slice::from_raw_parts(argv, argc as usize)
        .iter()
        .filter_map(|atom| match atom.a_type {
            A_FLOAT => Some(Atom::Float(atom.a_w.w_float as f64)),
            A_SYMBOL => symbol_from_raw(atom.a_w.w_symbol).map(Atom::Symbol),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::{t_symbol, t_word, A_NULL};

    #[test]
    fn test_atoms_from_raw() {
        let mut symbol = t_symbol {
            s_name: c"left".as_ptr(),
            s_thing: std::ptr::null_mut(),
            s_next: std::ptr::null_mut(),
        };
        let atoms = [
            t_atom {
                a_type: A_FLOAT,
                a_w: t_word { w_float: 0.5 },
            },
            t_atom {
                a_type: A_SYMBOL,
                a_w: t_word {
                    w_symbol: &mut symbol,
                },
            },
            t_atom {
                a_type: A_NULL,
                a_w: t_word { w_index: 0 },
            },
        ];

        let args = unsafe { atoms_from_raw(atoms.len() as c_int, atoms.as_ptr()) };
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].float(), 0.5);
        assert_eq!(args[1].symbol().map(|s| s.as_str()), Some("left"));
    }

    #[test]
    fn test_atoms_from_null() {
        let args = unsafe { atoms_from_raw(3, std::ptr::null()) };
        assert!(args.is_empty());
    }
}
