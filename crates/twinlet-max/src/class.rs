//! Max class registration and instance construction.

use std::ffi::c_void;
use std::ptr::{addr_of_mut, null_mut};
use std::sync::Arc;

use twinlet_core::{
    Atom, ClassConfig, External, ExternalInstance, ExternalResult, HostBinding, ObjectInstance,
};

use crate::api::{MaxApi, MaxMethod};
use crate::binding::MaxBinding;
use crate::error::{MaxError, MaxResult};
use crate::object::{free_object, MaxObject};
use crate::sys::{t_class, NewMethod};
use crate::trampoline;

pub(crate) type Construct = fn(
    Box<dyn HostBinding>,
    &ClassConfig,
    &[Atom],
) -> ExternalResult<Box<dyn ObjectInstance>>;

/// A registered Max class.
///
/// Max reports the inlet index of every message, so the class carries one
/// method per message kind plus `dsp64`, all registered up front.
pub struct MaxClass {
    pub(crate) api: Arc<dyn MaxApi>,
    raw: *mut t_class,
    config: &'static ClassConfig,
    construct: Construct,
}

// SAFETY: `raw` is an opaque class handle owned by Max for the lifetime of
// the process; it is only passed back to Max on its main thread.
unsafe impl Send for MaxClass {}
unsafe impl Sync for MaxClass {}

impl MaxClass {
    /// Create and register the Max class for `E`.
    pub fn register<E: External>(
        api: Arc<dyn MaxApi>,
        config: &'static ClassConfig,
        new_method: NewMethod,
    ) -> MaxResult<Arc<Self>> {
        let name = config.display_name();
        // SAFETY: new_method and free_object match the A_GIMME signature.
        let raw = unsafe {
            api.class_new(
                &name,
                new_method,
                free_object,
                std::mem::size_of::<MaxObject>(),
            )
        };
        if raw.is_null() {
            return Err(MaxError::ClassRefused(name));
        }

        // SAFETY: raw is the class just created.
        let registered = unsafe {
            api.class_add_method(raw, "bang", MaxMethod::Bang(trampoline::bang_in));
            api.class_add_method(raw, "int", MaxMethod::Int(trampoline::int_in));
            api.class_add_method(raw, "float", MaxMethod::Float(trampoline::float_in));
            api.class_add_method(raw, "symbol", MaxMethod::Symbol(trampoline::symbol_in));
            api.class_add_method(raw, "dsp64", MaxMethod::Dsp64(trampoline::dsp64));
            api.class_dspinit(raw);
            api.class_register(raw)
        };
        if !registered {
            return Err(MaxError::ClassRefused(name));
        }

        log::debug!("Registered Max class {}", config.summary());
        Ok(Arc::new(Self {
            api,
            raw,
            config,
            construct: ExternalInstance::<E>::boxed,
        }))
    }

    pub fn config(&self) -> &'static ClassConfig {
        self.config
    }

    pub fn name(&self) -> String {
        self.config.display_name()
    }

    pub(crate) fn raw(&self) -> *mut t_class {
        self.raw
    }

    /// Allocate and construct one instance.
    ///
    /// Returns null if construction fails; the reason is posted to the Max
    /// console and the partial object freed.
    pub fn new_object(self: &Arc<Self>, args: &[Atom]) -> *mut c_void {
        // SAFETY: raw is this API's class.
        let object = unsafe { self.api.object_alloc(self.raw) };
        if object.is_null() {
            log::error!("object_alloc failed for '{}'", self.config.name);
            return null_mut();
        }

        let record = object as *mut MaxObject;
        // SAFETY: object_alloc allocated size_of::<MaxObject>() bytes. The
        // Rust fields are written before they are read.
        unsafe {
            addr_of_mut!((*record).proxy_inlet).write(0);
            addr_of_mut!((*record).class).write(Arc::into_raw(Arc::clone(self)));
            addr_of_mut!((*record).dsp).write(false);
            addr_of_mut!((*record).busy).write(false);
            addr_of_mut!((*record).instance).write(None);
        }

        let binding = MaxBinding::new(Arc::clone(self), object);
        match (self.construct)(Box::new(binding), self.config, args) {
            Ok(instance) => {
                // SAFETY: initialized above.
                unsafe { (*record).instance = Some(instance) };
                object as *mut c_void
            }
            Err(e) => {
                log::error!("Failed to create '{}': {}", self.config.name, e);
                self.api.post(&format!("{}: {}", self.name(), e));
                // SAFETY: the free method tolerates a record without instance.
                unsafe { self.api.object_free(object as *mut c_void) };
                null_mut()
            }
        }
    }
}

impl std::fmt::Debug for MaxClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaxClass")
            .field("name", &self.config.name)
            .field("raw", &self.raw)
            .finish()
    }
}
