//! Process-wide class registration.
//!
//! Max calls `ext_main` once when it loads the external; the class created
//! there is stored globally so the raw `new` method can find it.

use std::ffi::{c_long, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::null_mut;
use std::sync::{Arc, OnceLock};

use twinlet_core::{ClassConfig, External};

use crate::api::MaxApi;
use crate::class::MaxClass;
use crate::host::MaxHost;
use crate::object::atoms_from_raw;
use crate::sys::{t_atom, t_symbol};

/// Global class storage (set by `ext_main`).
static CLASS: OnceLock<Arc<MaxClass>> = OnceLock::new();

/// Resolve the Max API and register the class for `E`.
pub fn setup<E: External>(config: &'static ClassConfig) {
    match MaxHost::load() {
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
    api: Arc<dyn MaxApi>,
    config: &'static ClassConfig,
) -> Option<Arc<MaxClass>> {
    if let Some(existing) = CLASS.get() {
        log::warn!(
            "Max class '{}' already registered, ignoring '{}'",
            existing.config().name,
            config.name
        );
        return Some(Arc::clone(existing));
    }
    let class = match MaxClass::register::<E>(api, config, new_object) {
        Ok(class) => class,
        Err(e) => {
            log::error!("{}", e);
            return None;
        }
    };
    Some(Arc::clone(CLASS.get_or_init(|| class)))
}

pub fn registered_class() -> Option<&'static Arc<MaxClass>> {
    CLASS.get()
}

pub fn is_registered() -> bool {
    CLASS.get().is_some()
}

/// `new` method of the registered class.
pub(crate) unsafe extern "C" fn new_object(
    _name: *mut t_symbol,
    argc: c_long,
    argv: *mut t_atom,
) -> *mut c_void {
    catch_unwind(AssertUnwindSafe(|| unsafe {
        let Some(class) = CLASS.get() else {
            log::error!("Max new method called before ext_main");
            return null_mut();
        };
        let args = atoms_from_raw(argc, argv);
        class.new_object(&args)
    }))
    .unwrap_or(null_mut())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockMax;
    use twinlet_core::{Atom, ExternalResult, Inlet, Message, Outlet, PortRegistry};

    static ACCUM: ClassConfig = ClassConfig::new("accum");
    static OTHER: ClassConfig = ClassConfig::new("other");

    #[derive(Default)]
    struct Accum {
        total: i64,
    }

    impl External for Accum {
        fn setup(&mut self, ports: &mut PortRegistry, args: &[Atom]) -> ExternalResult<()> {
            self.total = args.first().map_or(0, |a| a.float() as i64);
            ports.add_inlet_int("add")?;
            ports.add_outlet("total")?;
            Ok(())
        }

        fn int_received(&mut self, _inlet: &Inlet, value: i64, outlets: &[Outlet]) {
            self.total += value;
            outlets[0].send_int(self.total);
        }
    }

    // The only test touching the process-wide class.
    #[test]
    fn test_register_once_and_create_through_new_method() {
        let max = MockMax::new();
        let api: Arc<dyn MaxApi> = max.clone();
        let class = register::<Accum>(Arc::clone(&api), &ACCUM).unwrap();
        assert!(is_registered());

        let again = register::<Accum>(api, &OTHER).unwrap();
        assert!(Arc::ptr_eq(&class, &again));
        assert_eq!(registered_class().unwrap().config().name, "accum");

        let object = max.create("accum", &[Atom::Float(5.0)]).unwrap();
        max.send_int(object, 0, 2);
        assert_eq!(max.messages_from(object), vec![(0, Message::Int(7))]);
        max.destroy(object);
        assert_eq!(max.live_objects(), 0);
    }
}
