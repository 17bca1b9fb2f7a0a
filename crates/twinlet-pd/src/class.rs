//! Pd class registration and instance construction.

use std::collections::HashSet;
use std::ffi::c_void;
use std::ptr::{addr_of_mut, null_mut};
use std::sync::{Arc, Mutex};

use twinlet_core::{
    Atom, ClassConfig, External, ExternalInstance, ExternalResult, HostBinding, MessageKind,
    ObjectInstance, PortError, PortResult,
};

use crate::api::{PdApi, PdMethod};
use crate::binding::PdBinding;
use crate::error::{PdError, PdResult};
use crate::object::{free_object, PdObject};
use crate::sys::{t_class, NewMethod};
use crate::trampoline;

/// Type-erased `ExternalInstance::<E>::boxed`.
pub(crate) type Construct = fn(
    Box<dyn HostBinding>,
    &ClassConfig,
    &[Atom],
) -> ExternalResult<Box<dyn ObjectInstance>>;

/// A registered Pd class.
///
/// Slot methods and `dsp` are added to the class the first time an
/// instance needs them, then stay registered.
pub struct PdClass {
    pub(crate) api: Arc<dyn PdApi>,
    raw: *mut t_class,
    config: &'static ClassConfig,
    construct: Construct,
    methods: Mutex<HashSet<String>>,
}

// SAFETY: `raw` is an opaque class handle that Pd never frees; it is only
// passed back to Pd on the scheduler thread.
unsafe impl Send for PdClass {}
unsafe impl Sync for PdClass {}

impl PdClass {
    /// Create the Pd class for `E`.
    pub fn register<E: External>(
        api: Arc<dyn PdApi>,
        config: &'static ClassConfig,
        new_method: NewMethod,
    ) -> PdResult<Arc<Self>> {
        let name = config.display_name();
        // SAFETY: new_method and free_object match the A_GIMME signature.
        let raw = unsafe {
            api.class_new(
                &name,
                new_method,
                free_object,
                std::mem::size_of::<PdObject>(),
            )
        };
        if raw.is_null() {
            return Err(PdError::ClassRefused(name));
        }
        log::debug!("Registered Pd class {}", config.summary());
        Ok(Arc::new(Self {
            api,
            raw,
            config,
            construct: ExternalInstance::<E>::boxed,
            methods: Mutex::new(HashSet::new()),
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

    /// Register the method behind numbered slot `slot` of `kind`.
    pub(crate) fn ensure_slot_method(&self, kind: MessageKind, slot: usize) -> PortResult<String> {
        let selector = twinlet_utils::method_selector(kind.as_str(), slot);
        let method = trampoline::slot_method(kind, slot).ok_or_else(|| {
            PortError::HostRefused(format!("no {} entry point for slot {}", kind, slot))
        })?;
        self.ensure_method(&selector, method);
        Ok(selector)
    }

    /// Register the `dsp` method.
    pub(crate) fn ensure_dsp(&self) {
        self.ensure_method("dsp", PdMethod::Dsp(trampoline::dsp));
    }

    fn ensure_method(&self, selector: &str, method: PdMethod) {
        let mut methods = match self.methods.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if methods.insert(selector.to_string()) {
            // SAFETY: raw is this API's class and the method matches its tag.
            unsafe { self.api.class_add_method(self.raw, selector, method) };
            log::debug!("Added method '{}' to '{}'", selector, self.config.name);
        }
    }

    /// Allocate and construct one instance.
    ///
    /// Returns null if construction fails; the reason is posted to the
    /// Pd console and the partial object freed.
    pub fn new_object(self: &Arc<Self>, args: &[Atom]) -> *mut c_void {
        // SAFETY: raw is this API's class.
        let object = unsafe { self.api.pd_new(self.raw) };
        if object.is_null() {
            log::error!("pd_new failed for '{}'", self.config.name);
            return null_mut();
        }

        let record = object as *mut PdObject;
        // SAFETY: pd_new allocated size_of::<PdObject>() zeroed bytes past
        // the header. The Rust fields are written before they are read.
        unsafe {
            addr_of_mut!((*record).class).write(Arc::into_raw(Arc::clone(self)));
            addr_of_mut!((*record).perform_len).write(0);
            addr_of_mut!((*record).busy).write(false);
            addr_of_mut!((*record).instance).write(None);
        }

        let binding = PdBinding::new(Arc::clone(self), object);
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
                unsafe { self.api.pd_free(object) };
                null_mut()
            }
        }
    }
}

impl std::fmt::Debug for PdClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdClass")
            .field("name", &self.config.name)
            .field("raw", &self.raw)
            .finish()
    }
}
