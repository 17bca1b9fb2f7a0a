//! Process-wide class registration.
//!
//! Pd calls the setup function generated by [`export_pd!`](crate::export_pd)
//! once when it loads the external. The class created there is stored
//! globally so the raw `new` method can find it.

use std::ffi::{c_int, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::null_mut;
use std::sync::{Arc, OnceLock};

use twinlet_core::{ClassConfig, External};

use crate::api::PdApi;
use crate::class::PdClass;
use crate::host::PdHost;
use crate::object::atoms_from_raw;
use crate::sys::{t_atom, t_symbol};

/// Global class storage (set by the setup function).
static CLASS: OnceLock<Arc<PdClass>> = OnceLock::new();

/// Resolve the Pd API and register the class for `E`.
///
/// Called from the generated setup function. Failures are logged; Pd then
/// reports the object as not creatable.
pub fn setup<E: External>(config: &'static ClassConfig) {
    match PdHost::load() {
        Ok(host) => {
            register::<E>(Arc::new(host), config);
        }
        Err(e) => log::error!("{}: {}", config.name, e),
    }
}

/// Register the class for `E` against `api`.
///
/// Only one class per binary is supported. A second call logs a warning
/// and returns the class already registered.
pub fn register<E: External>(
    api: Arc<dyn PdApi>,
    config: &'static ClassConfig,
) -> Option<Arc<PdClass>> {
    if let Some(existing) = CLASS.get() {
        log::warn!(
            "Pd class '{}' already registered, ignoring '{}'",
            existing.config().name,
            config.name
        );
        return Some(Arc::clone(existing));
    }
    let class = match PdClass::register::<E>(api, config, new_object) {
        Ok(class) => class,
        Err(e) => {
            log::error!("{}", e);
            return None;
        }
    };
    Some(Arc::clone(CLASS.get_or_init(|| class)))
}

/// The registered class, if any.
pub fn registered_class() -> Option<&'static Arc<PdClass>> {
    CLASS.get()
}

/// Check if a class has been registered.
pub fn is_registered() -> bool {
    CLASS.get().is_some()
}

/// `new` method of the registered class.
pub(crate) unsafe extern "C" fn new_object(
    _name: *mut t_symbol,
    argc: c_int,
    argv: *mut t_atom,
) -> *mut c_void {
    catch_unwind(AssertUnwindSafe(|| unsafe {
        let Some(class) = CLASS.get() else {
            log::error!("Pd new method called before setup");
            return null_mut();
        };
        let args = atoms_from_raw(argc, argv);
        class.new_object(&args)
    }))
    .unwrap_or(null_mut())
}
