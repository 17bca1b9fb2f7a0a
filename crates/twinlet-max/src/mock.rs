//! In-process stand-in for Max.
//!
//! [`MockMax`] implements [`MaxApi`] and plays the host's part: it keeps
//! box inlets and outlets in Max's left-to-right order, reports the inlet
//! of each message through `proxy_getinlet`, runs `dsp64` and the perform
//! routines it adds, and records everything sent to outlets.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::collections::HashMap;
use std::ffi::{c_long, c_void, CString};
use std::sync::{Arc, Mutex, MutexGuard};

use twinlet_core::{Atom, ClassConfig, External, ExternalInstance, Message, Symbol};

use crate::api::{MaxApi, MaxMethod};
use crate::class::MaxClass;
use crate::factory;
use crate::object::MaxObject;
use crate::sys::{
    t_atom, t_atom_long, t_class, t_object, t_pxobject, t_symbol, t_word, FreeMethod, NewMethod,
    Perform64Method, A_FLOAT, A_SYM,
};

const OBJECT_ALIGN: usize = 16;

/// Something sent to an outlet.
#[derive(Debug, Clone, PartialEq)]
pub struct OutletMessage {
    pub object: usize,
    /// Outlet position, left to right.
    pub outlet: usize,
    pub message: Message,
}

/// A host resource released by the external.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// `dsp_free` on the object.
    Dsp,
    /// A proxy inlet, by id.
    Proxy(usize),
    /// An outlet, by position.
    Outlet(usize),
}

struct MockClass {
    name: String,
    new_method: NewMethod,
    free_method: FreeMethod,
    size: usize,
    methods: HashMap<String, MaxMethod>,
    dsp: bool,
    registered: bool,
}

struct MockObject {
    class: usize,
    size: usize,
    signal_inlets: usize,
    dsp: bool,
    /// Proxy handles, sorted by id.
    proxies: Vec<usize>,
    /// Outlet handles, left to right.
    outlets: Vec<usize>,
    current_inlet: c_long,
    created_outlets: usize,
}

struct MockProxy {
    owner: usize,
    id: c_long,
    stuffloc: usize,
}

struct MockOutlet {
    owner: usize,
    creation: usize,
    signal: bool,
}

#[derive(Default)]
struct State {
    next_handle: usize,
    classes: HashMap<usize, MockClass>,
    objects: HashMap<usize, MockObject>,
    proxies: HashMap<usize, MockProxy>,
    outlets: HashMap<usize, MockOutlet>,
    symbols: HashMap<String, usize>,
    messages: Vec<OutletMessage>,
    posts: Vec<String>,
    releases: Vec<Release>,
    chain: Vec<(usize, Perform64Method)>,
    /// Patch cords: (object, outlet) to (object, inlet).
    cords: Vec<((usize, usize), (usize, usize))>,
}

impl State {
    fn handle(&mut self) -> usize {
        self.next_handle += 1;
        self.next_handle
    }

    fn class_of(&self, object: usize) -> Option<&MockClass> {
        self.objects
            .get(&object)
            .and_then(|o| self.classes.get(&o.class))
    }

    fn remove_proxy(&mut self, proxy: usize) -> bool {
        let Some(record) = self.proxies.remove(&proxy) else {
            return false;
        };
        if let Some(owner) = self.objects.get_mut(&record.owner) {
            owner.proxies.retain(|p| *p != proxy);
        }
        self.releases.push(Release::Proxy(record.id as usize));
        true
    }

    fn remove_outlet(&mut self, outlet: usize) {
        let Some(record) = self.outlets.remove(&outlet) else {
            return;
        };
        if let Some(owner) = self.objects.get_mut(&record.owner) {
            owner.outlets.retain(|o| *o != outlet);
            // Outlets are prepended, so the last one created is leftmost.
            let position = owner.created_outlets - 1 - record.creation;
            self.releases.push(Release::Outlet(position));
        }
    }
}

enum Incoming {
    Bang,
    Int(t_atom_long),
    Float(f64),
    Symbol(*mut t_symbol),
}

impl Incoming {
    fn selector(&self) -> &'static str {
        match self {
            Self::Bang => "bang",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Symbol(_) => "symbol",
        }
    }
}

/// Recording Max host.
#[derive(Default)]
pub struct MockMax {
    state: Mutex<State>,
}

impl MockMax {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register the class for `E` on this host, without touching the
    /// process-wide class.
    pub fn register<E: External>(
        self: &Arc<Self>,
        config: &'static ClassConfig,
    ) -> Option<Arc<MaxClass>> {
        let api: Arc<dyn MaxApi> = Arc::clone(self) as Arc<dyn MaxApi>;
        MaxClass::register::<E>(api, config, factory::new_object).ok()
    }

    pub fn instantiate(&self, class: &Arc<MaxClass>, args: &[Atom]) -> Option<*mut t_object> {
        let object = class.new_object(args) as *mut t_object;
        (!object.is_null()).then_some(object)
    }

    /// Create an instance through the class's raw `new` method.
    pub fn create(&self, class_name: &str, args: &[Atom]) -> Option<*mut t_object> {
        let new_method = {
            let state = self.lock();
            state
                .classes
                .values()
                .find(|c| c.name == class_name && c.registered)
                .map(|c| c.new_method)?
        };
        let mut atoms: Vec<t_atom> = args
            .iter()
            .map(|arg| match arg {
                Atom::Float(f) => t_atom {
                    a_type: A_FLOAT,
                    a_w: t_word { w_float: *f },
                },
                Atom::Symbol(s) => t_atom {
                    a_type: A_SYM,
                    a_w: t_word {
                        w_sym: self.gensym(s.as_str()),
                    },
                },
            })
            .collect();
        let name = self.gensym(class_name);
        // SAFETY: atoms outlives the call.
        let object = unsafe { new_method(name, atoms.len() as c_long, atoms.as_mut_ptr()) }
            as *mut t_object;
        (!object.is_null()).then_some(object)
    }

    pub fn destroy(&self, object: *mut t_object) {
        // SAFETY: object came from object_alloc on this host.
        unsafe { self.object_free(object as *mut c_void) }
    }

    /// The external behind `object`.
    ///
    /// # Safety
    ///
    /// `object` must be a live instance created on this host.
    pub unsafe fn external<'a, E: External>(&self, object: *mut t_object) -> Option<&'a E> {
        let record = MaxObject::from_raw(object);
        record
            .instance
            .as_ref()?
            .as_any()
            .downcast_ref::<ExternalInstance<E>>()
            .map(|i| i.external())
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Patch an outlet into an inlet. Outlet calls then deliver to the
    /// inlet before returning.
    pub fn connect(&self, from: *mut t_object, outlet: usize, to: *mut t_object, inlet: usize) {
        self.lock()
            .cords
            .push(((from as usize, outlet), (to as usize, inlet)));
    }

    pub fn send_bang(&self, object: *mut t_object, inlet: usize) {
        self.send(object, inlet, Incoming::Bang);
    }

    pub fn send_int(&self, object: *mut t_object, inlet: usize, value: i64) {
        self.send(object, inlet, Incoming::Int(value));
    }

    pub fn send_float(&self, object: *mut t_object, inlet: usize, value: f64) {
        self.send(object, inlet, Incoming::Float(value));
    }

    pub fn send_symbol(&self, object: *mut t_object, inlet: usize, symbol: &str) {
        let symbol = self.gensym(symbol);
        self.send(object, inlet, Incoming::Symbol(symbol));
    }

    fn send(&self, object: *mut t_object, inlet: usize, incoming: Incoming) {
        let mut state = self.lock();
        let key = object as usize;
        let Some(record) = state.objects.get(&key) else {
            return;
        };

        let own_inlets = record.signal_inlets.max(1);
        let proxy = record
            .proxies
            .iter()
            .filter_map(|p| state.proxies.get(p))
            .find(|p| p.id as usize == inlet)
            .map(|p| p.stuffloc);
        let stuffloc = match (inlet < own_inlets, proxy) {
            (true, _) => None,
            (false, Some(stuffloc)) => Some(stuffloc),
            (false, None) => {
                state.posts.push(format!("inlet {} does not exist", inlet));
                return;
            }
        };

        let method = state
            .class_of(key)
            .and_then(|c| c.methods.get(incoming.selector()))
            .copied();
        if let Some(record) = state.objects.get_mut(&key) {
            record.current_inlet = inlet as c_long;
        }
        if let Some(stuffloc) = stuffloc {
            // SAFETY: stuffloc points into the live object record.
            unsafe { *(stuffloc as *mut c_long) = inlet as c_long };
        }
        drop(state);

        // SAFETY: the method was registered for this object's class.
        unsafe {
            match (method, incoming) {
                (Some(MaxMethod::Bang(m)), Incoming::Bang) => m(object),
                (Some(MaxMethod::Int(m)), Incoming::Int(value)) => m(object, value),
                (Some(MaxMethod::Float(m)), Incoming::Float(value)) => m(object, value),
                (Some(MaxMethod::Symbol(m)), Incoming::Symbol(symbol)) => m(object, symbol),
                (_, incoming) => self
                    .lock()
                    .posts
                    .push(format!("doesn't understand \"{}\"", incoming.selector())),
            }
        }
    }

    // =========================================================================
    // DSP
    // =========================================================================

    /// Compile the object into the DSP chain.
    pub fn dsp(&self, object: *mut t_object, max_vector_size: usize) {
        let (method, dsp64) = {
            let mut state = self.lock();
            let method = state
                .class_of(object as usize)
                .and_then(|c| c.methods.get("dsp64"))
                .copied();
            (method, state.handle())
        };
        let Some(MaxMethod::Dsp64(method)) = method else {
            return;
        };
        let mut count = [1i16; 64];
        // SAFETY: the method belongs to this object's class.
        unsafe {
            method(
                object,
                dsp64 as *mut t_object,
                count.as_mut_ptr(),
                44_100.0,
                max_vector_size as c_long,
                0,
            )
        };
    }

    /// Run the object's perform routine over one block.
    ///
    /// Returns false if the object is not in the chain.
    ///
    /// # Safety
    ///
    /// Every buffer must hold `frames` samples.
    pub unsafe fn perform(
        &self,
        object: *mut t_object,
        inputs: &[*mut f64],
        outputs: &[*mut f64],
        frames: usize,
    ) -> bool {
        let perform = {
            let state = self.lock();
            state
                .chain
                .iter()
                .find(|(owner, _)| *owner == object as usize)
                .map(|(_, perform)| *perform)
        };
        let Some(perform) = perform else {
            return false;
        };
        let mut ins = inputs.to_vec();
        let mut outs = outputs.to_vec();
        perform(
            object,
            std::ptr::null_mut(),
            ins.as_mut_ptr(),
            ins.len() as c_long,
            outs.as_mut_ptr(),
            outs.len() as c_long,
            frames as c_long,
            0,
            std::ptr::null_mut(),
        );
        true
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn take_messages(&self) -> Vec<OutletMessage> {
        std::mem::take(&mut self.lock().messages)
    }

    /// Messages `object` sent, as `(outlet, message)`, since the last take.
    pub fn messages_from(&self, object: *mut t_object) -> Vec<(usize, Message)> {
        let mut state = self.lock();
        let key = object as usize;
        let (mine, rest): (Vec<_>, Vec<_>) =
            state.messages.drain(..).partition(|m| m.object == key);
        state.messages = rest;
        mine.into_iter().map(|m| (m.outlet, m.message)).collect()
    }

    pub fn posts(&self) -> Vec<String> {
        self.lock().posts.clone()
    }

    pub fn releases(&self) -> Vec<Release> {
        self.lock().releases.clone()
    }

    /// Signal inlets created by `dsp_setup`.
    pub fn signal_inlets(&self, object: *mut t_object) -> usize {
        self.lock()
            .objects
            .get(&(object as usize))
            .map_or(0, |o| o.signal_inlets)
    }

    /// Whether `dsp_setup` ran and `dsp_free` has not.
    pub fn dsp_active(&self, object: *mut t_object) -> bool {
        self.lock()
            .objects
            .get(&(object as usize))
            .is_some_and(|o| o.dsp)
    }

    /// Proxy ids, left to right.
    pub fn proxy_ids(&self, object: *mut t_object) -> Vec<usize> {
        let state = self.lock();
        state
            .objects
            .get(&(object as usize))
            .map(|o| {
                o.proxies
                    .iter()
                    .filter_map(|p| state.proxies.get(p))
                    .map(|p| p.id as usize)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether each outlet is a signal outlet, left to right.
    pub fn outlet_kinds(&self, object: *mut t_object) -> Vec<bool> {
        let state = self.lock();
        state
            .objects
            .get(&(object as usize))
            .map(|o| {
                o.outlets
                    .iter()
                    .filter_map(|h| state.outlets.get(h))
                    .map(|o| o.signal)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the class was set up for DSP and registered in the box namespace.
    pub fn class_ready(&self, class: &MaxClass) -> bool {
        self.lock()
            .classes
            .get(&(class.raw() as usize))
            .is_some_and(|c| c.dsp && c.registered)
    }

    pub fn live_objects(&self) -> usize {
        self.lock().objects.len()
    }
}

impl MaxApi for MockMax {
    unsafe fn class_new(
        &self,
        name: &str,
        new_method: NewMethod,
        free_method: FreeMethod,
        size: usize,
    ) -> *mut t_class {
        let mut state = self.lock();
        let handle = state.handle();
        state.classes.insert(
            handle,
            MockClass {
                name: name.to_string(),
                new_method,
                free_method,
                size,
                methods: HashMap::new(),
                dsp: false,
                registered: false,
            },
        );
        handle as *mut t_class
    }

    unsafe fn class_add_method(&self, class: *mut t_class, name: &str, method: MaxMethod) {
        if let Some(class) = self.lock().classes.get_mut(&(class as usize)) {
            class.methods.insert(name.to_string(), method);
        }
    }

    unsafe fn class_dspinit(&self, class: *mut t_class) {
        if let Some(class) = self.lock().classes.get_mut(&(class as usize)) {
            class.dsp = true;
        }
    }

    unsafe fn class_register(&self, class: *mut t_class) -> bool {
        match self.lock().classes.get_mut(&(class as usize)) {
            Some(class) => {
                class.registered = true;
                true
            }
            None => false,
        }
    }

    unsafe fn object_alloc(&self, class: *mut t_class) -> *mut t_object {
        let mut state = self.lock();
        let Some(size) = state.classes.get(&(class as usize)).map(|c| c.size) else {
            return std::ptr::null_mut();
        };
        let Ok(layout) = Layout::from_size_align(size.max(1), OBJECT_ALIGN) else {
            return std::ptr::null_mut();
        };
        let object = alloc_zeroed(layout) as *mut t_object;
        if object.is_null() {
            return object;
        }
        state.objects.insert(
            object as usize,
            MockObject {
                class: class as usize,
                size,
                signal_inlets: 0,
                dsp: false,
                proxies: Vec::new(),
                outlets: Vec::new(),
                current_inlet: 0,
                created_outlets: 0,
            },
        );
        object
    }

    unsafe fn object_free(&self, object: *mut c_void) {
        let key = object as usize;
        // Proxies are objects too.
        if self.lock().remove_proxy(key) {
            return;
        }
        let free_method = {
            let state = self.lock();
            state.class_of(key).map(|c| c.free_method)
        };
        let Some(free_method) = free_method else {
            return;
        };
        free_method(object as *mut t_object);

        let mut state = self.lock();
        let Some(record) = state.objects.remove(&key) else {
            return;
        };
        for outlet in &record.outlets {
            state.outlets.remove(outlet);
        }
        for proxy in &record.proxies {
            state.proxies.remove(proxy);
        }
        state.chain.retain(|(owner, _)| *owner != key);
        if let Ok(layout) = Layout::from_size_align(record.size.max(1), OBJECT_ALIGN) {
            dealloc(object as *mut u8, layout);
        }
    }

    unsafe fn proxy_new(
        &self,
        owner: *mut t_object,
        id: c_long,
        stuffloc: *mut c_long,
    ) -> *mut c_void {
        let mut state = self.lock();
        let handle = state.handle();
        state.proxies.insert(
            handle,
            MockProxy {
                owner: owner as usize,
                id,
                stuffloc: stuffloc as usize,
            },
        );
        let State {
            objects, proxies, ..
        } = &mut *state;
        let Some(object) = objects.get_mut(&(owner as usize)) else {
            return std::ptr::null_mut();
        };
        object.proxies.push(handle);
        object
            .proxies
            .sort_by_key(|p| proxies.get(p).map_or(0, |p| p.id));
        handle as *mut c_void
    }

    unsafe fn proxy_getinlet(&self, owner: *mut t_object) -> c_long {
        self.lock()
            .objects
            .get(&(owner as usize))
            .map_or(0, |o| o.current_inlet)
    }

    unsafe fn dsp_setup(&self, owner: *mut t_pxobject, signal_inlets: c_long) {
        if let Some(object) = self.lock().objects.get_mut(&(owner as usize)) {
            object.signal_inlets = signal_inlets.max(0) as usize;
            object.dsp = true;
        }
    }

    unsafe fn dsp_free(&self, owner: *mut t_pxobject) {
        let mut state = self.lock();
        if let Some(object) = state.objects.get_mut(&(owner as usize)) {
            object.dsp = false;
            state.releases.push(Release::Dsp);
        }
    }

    unsafe fn outlet_new(&self, owner: *mut t_object, kind: Option<&str>) -> *mut c_void {
        let mut state = self.lock();
        let handle = state.handle();
        let Some(object) = state.objects.get_mut(&(owner as usize)) else {
            return std::ptr::null_mut();
        };
        let creation = object.created_outlets;
        object.created_outlets += 1;
        object.outlets.insert(0, handle);
        state.outlets.insert(
            handle,
            MockOutlet {
                owner: owner as usize,
                creation,
                signal: kind == Some("signal"),
            },
        );
        handle as *mut c_void
    }

    unsafe fn outlet_delete(&self, outlet: *mut c_void) {
        self.lock().remove_outlet(outlet as usize);
    }

    unsafe fn outlet_bang(&self, outlet: *mut c_void) {
        self.record(outlet, Message::Bang);
    }

    unsafe fn outlet_int(&self, outlet: *mut c_void, value: t_atom_long) {
        self.record(outlet, Message::Int(value));
    }

    unsafe fn outlet_float(&self, outlet: *mut c_void, value: f64) {
        self.record(outlet, Message::Float(value));
    }

    unsafe fn outlet_symbol(&self, outlet: *mut c_void, symbol: &str) {
        self.record(outlet, Message::Symbol(Symbol::new(symbol)));
    }

    unsafe fn dsp_add64(
        &self,
        _dsp64: *mut t_object,
        owner: *mut t_object,
        perform: Perform64Method,
    ) {
        self.lock().chain.push((owner as usize, perform));
    }

    fn gensym(&self, name: &str) -> *mut t_symbol {
        let mut state = self.lock();
        if let Some(symbol) = state.symbols.get(name) {
            return *symbol as *mut t_symbol;
        }
        let text = CString::new(name).unwrap_or_default();
        let symbol = Box::leak(Box::new(t_symbol {
            s_name: text.into_raw(),
            s_thing: std::ptr::null_mut(),
        })) as *mut t_symbol;
        state.symbols.insert(name.to_string(), symbol as usize);
        symbol
    }

    fn post(&self, message: &str) {
        self.lock().posts.push(message.to_string());
    }
}

impl MockMax {
    fn record(&self, outlet: *mut c_void, message: Message) {
        let targets: Vec<(usize, usize)> = {
            let mut state = self.lock();
            let handle = outlet as usize;
            let Some(object) = state.outlets.get(&handle).map(|o| o.owner) else {
                return;
            };
            let Some(position) = state
                .objects
                .get(&object)
                .and_then(|o| o.outlets.iter().position(|h| *h == handle))
            else {
                return;
            };
            state.messages.push(OutletMessage {
                object,
                outlet: position,
                message: message.clone(),
            });
            state
                .cords
                .iter()
                .filter(|(from, _)| *from == (object, position))
                .map(|(_, to)| *to)
                .collect()
        };

        for (object, inlet) in targets {
            let object = object as *mut t_object;
            match &message {
                Message::Bang => self.send_bang(object, inlet),
                Message::Int(value) => self.send_int(object, inlet, *value),
                Message::Float(value) => self.send_float(object, inlet, *value),
                Message::Symbol(symbol) => self.send_symbol(object, inlet, symbol.as_str()),
            }
        }
    }
}
