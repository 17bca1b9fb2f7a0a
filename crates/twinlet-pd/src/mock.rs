//! In-process stand-in for Pd.
//!
//! [`MockPd`] implements [`PdApi`] over plain Rust collections and plays
//! the host's part: it routes messages into inlets the way Pd's inlet
//! objects do, runs the DSP chain and records everything sent to outlets.
//! Host objects are fake handles and are never dereferenced.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::collections::HashMap;
use std::ffi::{c_int, CString};
use std::sync::{Arc, Mutex, MutexGuard};

use twinlet_core::{Atom, ClassConfig, External, ExternalInstance, Message, Symbol};

use crate::api::{PdApi, PdMethod};
use crate::class::PdClass;
use crate::factory;
use crate::object::PdObject;
use crate::sys::{
    t_atom, t_class, t_float, t_inlet, t_int, t_object, t_outlet, t_perfroutine, t_sample,
    t_signal, t_symbol, t_word, FreeMethod, NewMethod, A_FLOAT, A_SYMBOL,
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

/// A host port freed by the external, by creation position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Inlet(usize),
    Outlet(usize),
}

#[derive(Debug, Clone)]
enum InletKind {
    Signal,
    Forward { kind: String, selector: String },
    PassiveFloat(usize),
    PassiveSymbol(usize),
}

impl InletKind {
    fn describe(&self) -> String {
        match self {
            Self::Signal => "signal".into(),
            Self::Forward { kind, .. } => kind.clone(),
            Self::PassiveFloat(_) => "passive float".into(),
            Self::PassiveSymbol(_) => "passive symbol".into(),
        }
    }
}

struct MockInlet {
    owner: usize,
    position: usize,
    kind: InletKind,
}

struct MockOutlet {
    owner: usize,
    position: usize,
    signal: bool,
}

struct MockClass {
    name: String,
    new_method: NewMethod,
    free_method: FreeMethod,
    size: usize,
    methods: HashMap<String, PdMethod>,
}

struct MockObject {
    class: usize,
    size: usize,
    inlets: Vec<usize>,
    outlets: Vec<usize>,
    created_inlets: usize,
    created_outlets: usize,
}

#[derive(Default)]
struct State {
    next_handle: usize,
    classes: HashMap<usize, MockClass>,
    objects: HashMap<usize, MockObject>,
    inlets: HashMap<usize, MockInlet>,
    outlets: HashMap<usize, MockOutlet>,
    symbols: HashMap<String, usize>,
    messages: Vec<OutletMessage>,
    posts: Vec<String>,
    releases: Vec<Release>,
    chain: Vec<(t_perfroutine, Vec<t_int>)>,
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

    fn remove_inlet(&mut self, inlet: usize) {
        if let Some(record) = self.inlets.remove(&inlet) {
            if let Some(owner) = self.objects.get_mut(&record.owner) {
                owner.inlets.retain(|i| *i != inlet);
            }
            self.releases.push(Release::Inlet(record.position));
        }
    }

    fn remove_outlet(&mut self, outlet: usize) {
        if let Some(record) = self.outlets.remove(&outlet) {
            if let Some(owner) = self.objects.get_mut(&record.owner) {
                owner.outlets.retain(|o| *o != outlet);
            }
            self.releases.push(Release::Outlet(record.position));
        }
    }
}

enum Incoming {
    Bang,
    Float(t_float),
    Symbol(*mut t_symbol),
}

impl Incoming {
    fn name(&self) -> &'static str {
        match self {
            Self::Bang => "bang",
            Self::Float(_) => "float",
            Self::Symbol(_) => "symbol",
        }
    }
}

enum Route {
    Missing,
    Absorbed,
    Wrong(String),
    Method(Option<PdMethod>),
}

/// Recording Pd host.
#[derive(Default)]
pub struct MockPd {
    state: Mutex<State>,
}

impl MockPd {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register the class for `E` on this host.
    ///
    /// Unlike [`factory::register`], this does not touch the process-wide
    /// class, so any number of mock hosts can coexist.
    pub fn register<E: External>(
        self: &Arc<Self>,
        config: &'static ClassConfig,
    ) -> Option<Arc<PdClass>> {
        let api: Arc<dyn PdApi> = Arc::clone(self) as Arc<dyn PdApi>;
        PdClass::register::<E>(api, config, factory::new_object).ok()
    }

    /// Create an instance, as typing the object into a patch would.
    pub fn instantiate(&self, class: &Arc<PdClass>, args: &[Atom]) -> Option<*mut t_object> {
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
                .find(|c| c.name == class_name)
                .map(|c| c.new_method)?
        };
        let mut atoms: Vec<t_atom> = args
            .iter()
            .map(|arg| match arg {
                Atom::Float(f) => t_atom {
                    a_type: A_FLOAT,
                    a_w: t_word {
                        w_float: *f as t_float,
                    },
                },
                Atom::Symbol(s) => t_atom {
                    a_type: A_SYMBOL,
                    a_w: t_word {
                        w_symbol: self.gensym(s.as_str()),
                    },
                },
            })
            .collect();
        let name = self.gensym(class_name);
        // SAFETY: atoms outlives the call.
        let object =
            unsafe { new_method(name, atoms.len() as c_int, atoms.as_mut_ptr()) } as *mut t_object;
        (!object.is_null()).then_some(object)
    }

    /// Free an instance, as deleting it from the patch would.
    pub fn destroy(&self, object: *mut t_object) {
        // SAFETY: object came from pd_new on this host.
        unsafe { self.pd_free(object) }
    }

    /// The external behind `object`.
    ///
    /// # Safety
    ///
    /// `object` must be a live instance created on this host.
    pub unsafe fn external<'a, E: External>(&self, object: *mut t_object) -> Option<&'a E> {
        let instance = PdObject::instance_mut(object)?;
        instance
            .as_any()
            .downcast_ref::<ExternalInstance<E>>()
            .map(|i| i.external())
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Draw a patch cord. Messages sent to the outlet are then also
    /// delivered to the inlet, depth first, as Pd does.
    pub fn connect(&self, from: *mut t_object, outlet: usize, to: *mut t_object, inlet: usize) {
        self.lock()
            .cords
            .push(((from as usize, outlet), (to as usize, inlet)));
    }

    pub fn send_bang(&self, object: *mut t_object, inlet: usize) {
        self.send(object, inlet, Incoming::Bang);
    }

    pub fn send_float(&self, object: *mut t_object, inlet: usize, value: f32) {
        self.send(object, inlet, Incoming::Float(value));
    }

    pub fn send_symbol(&self, object: *mut t_object, inlet: usize, symbol: &str) {
        let symbol = self.gensym(symbol);
        self.send(object, inlet, Incoming::Symbol(symbol));
    }

    fn send(&self, object: *mut t_object, position: usize, incoming: Incoming) {
        let mut state = self.lock();
        let key = object as usize;
        let route = match state
            .objects
            .get(&key)
            .and_then(|o| o.inlets.get(position))
            .and_then(|i| state.inlets.get(i))
        {
            None => Route::Missing,
            Some(inlet) => match (&inlet.kind, &incoming) {
                // A float into a signal inlet sets its scalar value.
                (InletKind::Signal, Incoming::Float(_)) => Route::Absorbed,
                (InletKind::PassiveFloat(cell), Incoming::Float(value)) => {
                    // SAFETY: the cell stays alive until the inlet is freed.
                    unsafe { *(*cell as *mut t_float) = *value };
                    Route::Absorbed
                }
                (InletKind::PassiveSymbol(cell), Incoming::Symbol(symbol)) => {
                    // SAFETY: as above.
                    unsafe { *(*cell as *mut *mut t_symbol) = *symbol };
                    Route::Absorbed
                }
                (InletKind::Forward { kind, selector }, _) if kind == incoming.name() => {
                    Route::Method(
                        state
                            .class_of(key)
                            .and_then(|c| c.methods.get(selector))
                            .copied(),
                    )
                }
                (InletKind::Forward { kind, .. }, _) => Route::Wrong(kind.clone()),
                (InletKind::PassiveFloat(_), _) => Route::Wrong("float".into()),
                (InletKind::PassiveSymbol(_), _) => Route::Wrong("symbol".into()),
                (InletKind::Signal, _) => Route::Wrong("signal".into()),
            },
        };

        let method = match route {
            Route::Absorbed => return,
            Route::Missing => {
                state.posts.push(format!("inlet {} does not exist", position));
                return;
            }
            Route::Wrong(expected) => {
                let message = format!(
                    "inlet: expected '{}' but got '{}'",
                    expected,
                    incoming.name()
                );
                state.posts.push(message);
                return;
            }
            Route::Method(method) => method,
        };
        drop(state);

        // SAFETY: the method was registered for this object's class.
        unsafe {
            match (method, incoming) {
                (Some(PdMethod::Bang(m)), Incoming::Bang) => m(object),
                (Some(PdMethod::Float(m)), Incoming::Float(value)) => m(object, value),
                (Some(PdMethod::Symbol(m)), Incoming::Symbol(symbol)) => m(object, symbol),
                _ => self.lock().posts.push("no method for message".into()),
            }
        }
    }

    // =========================================================================
    // DSP
    // =========================================================================

    /// Run the object's `dsp` method with one buffer per signal port,
    /// inputs first.
    ///
    /// # Safety
    ///
    /// Every buffer must hold `block_size` samples and stay valid while
    /// the chain is ticked.
    pub unsafe fn dsp(&self, object: *mut t_object, buffers: &[*mut t_sample], block_size: usize) {
        let method = {
            let state = self.lock();
            state
                .class_of(object as usize)
                .and_then(|c| c.methods.get("dsp"))
                .copied()
        };
        let Some(PdMethod::Dsp(dsp)) = method else {
            return;
        };
        let mut signals: Vec<t_signal> = buffers
            .iter()
            .map(|b| t_signal {
                s_n: block_size as c_int,
                s_vec: *b,
                s_sr: 44_100.0,
            })
            .collect();
        let mut pointers: Vec<*mut t_signal> =
            signals.iter_mut().map(|s| s as *mut t_signal).collect();
        dsp(object, pointers.as_mut_ptr());
    }

    /// Drop the DSP chain.
    pub fn clear_dsp(&self) {
        self.lock().chain.clear();
    }

    /// Number of perform routines in the chain.
    pub fn chain_len(&self) -> usize {
        self.lock().chain.len()
    }

    /// Run one block through the chain.
    ///
    /// Returns false if any perform routine returned a pointer other than
    /// the start of the next routine.
    pub fn tick(&self) -> bool {
        let chain = self.lock().chain.clone();
        let mut ok = true;
        for (perform, args) in chain {
            let mut words = Vec::with_capacity(args.len() + 2);
            words.push(perform as t_int);
            words.extend_from_slice(&args);
            words.push(0);
            let w = words.as_mut_ptr();
            // SAFETY: the words are the list dsp_add received.
            let next = unsafe { perform(w) };
            if next != unsafe { w.add(args.len() + 1) } {
                log::error!("perform routine returned a misaligned chain pointer");
                ok = false;
            }
        }
        ok
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Everything sent to outlets since the last call.
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

    /// Kinds of the object's inlets, left to right.
    pub fn inlet_kinds(&self, object: *mut t_object) -> Vec<String> {
        let state = self.lock();
        state
            .objects
            .get(&(object as usize))
            .map(|o| {
                o.inlets
                    .iter()
                    .filter_map(|i| state.inlets.get(i))
                    .map(|i| i.kind.describe())
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
                    .filter_map(|i| state.outlets.get(i))
                    .map(|o| o.signal)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Selectors registered on the class, sorted.
    pub fn methods(&self, class: &PdClass) -> Vec<String> {
        let state = self.lock();
        let mut methods: Vec<String> = state
            .classes
            .get(&(class.raw() as usize))
            .map(|c| c.methods.keys().cloned().collect())
            .unwrap_or_default();
        methods.sort();
        methods
    }

    pub fn live_objects(&self) -> usize {
        self.lock().objects.len()
    }
}

impl PdApi for MockPd {
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
            },
        );
        handle as *mut t_class
    }

    unsafe fn class_add_method(&self, class: *mut t_class, selector: &str, method: PdMethod) {
        if let Some(class) = self.lock().classes.get_mut(&(class as usize)) {
            class.methods.insert(selector.to_string(), method);
        }
    }

    unsafe fn pd_new(&self, class: *mut t_class) -> *mut t_object {
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
                inlets: Vec::new(),
                outlets: Vec::new(),
                created_inlets: 0,
                created_outlets: 0,
            },
        );
        object
    }

    unsafe fn pd_free(&self, object: *mut t_object) {
        let free_method = {
            let state = self.lock();
            state.class_of(object as usize).map(|c| c.free_method)
        };
        let Some(free_method) = free_method else {
            return;
        };
        free_method(object);

        let mut state = self.lock();
        let Some(record) = state.objects.get(&(object as usize)) else {
            return;
        };
        let (inlets, outlets, size) = (record.inlets.clone(), record.outlets.clone(), record.size);
        for inlet in inlets {
            state.remove_inlet(inlet);
        }
        for outlet in outlets {
            state.remove_outlet(outlet);
        }
        state.objects.remove(&(object as usize));
        if let Ok(layout) = Layout::from_size_align(size.max(1), OBJECT_ALIGN) {
            dealloc(object as *mut u8, layout);
        }
    }

    unsafe fn inlet_new(&self, owner: *mut t_object, kind: &str, selector: &str) -> *mut t_inlet {
        let kind = if kind == "signal" {
            InletKind::Signal
        } else {
            InletKind::Forward {
                kind: kind.to_string(),
                selector: selector.to_string(),
            }
        };
        self.add_inlet(owner, kind)
    }

    unsafe fn float_inlet_new(&self, owner: *mut t_object, cell: *mut t_float) -> *mut t_inlet {
        self.add_inlet(owner, InletKind::PassiveFloat(cell as usize))
    }

    unsafe fn symbol_inlet_new(
        &self,
        owner: *mut t_object,
        cell: *mut *mut t_symbol,
    ) -> *mut t_inlet {
        self.add_inlet(owner, InletKind::PassiveSymbol(cell as usize))
    }

    unsafe fn inlet_free(&self, inlet: *mut t_inlet) {
        self.lock().remove_inlet(inlet as usize);
    }

    unsafe fn outlet_new(&self, owner: *mut t_object, kind: Option<&str>) -> *mut t_outlet {
        let mut state = self.lock();
        let handle = state.handle();
        let Some(object) = state.objects.get_mut(&(owner as usize)) else {
            return std::ptr::null_mut();
        };
        let position = object.created_outlets;
        object.created_outlets += 1;
        object.outlets.push(handle);
        state.outlets.insert(
            handle,
            MockOutlet {
                owner: owner as usize,
                position,
                signal: kind == Some("signal"),
            },
        );
        handle as *mut t_outlet
    }

    unsafe fn outlet_free(&self, outlet: *mut t_outlet) {
        self.lock().remove_outlet(outlet as usize);
    }

    unsafe fn outlet_bang(&self, outlet: *mut t_outlet) {
        self.record(outlet, Message::Bang);
    }

    unsafe fn outlet_float(&self, outlet: *mut t_outlet, value: t_float) {
        self.record(outlet, Message::Float(value as f64));
    }

    unsafe fn outlet_symbol(&self, outlet: *mut t_outlet, symbol: &str) {
        self.record(outlet, Message::Symbol(Symbol::new(symbol)));
    }

    unsafe fn dsp_add(&self, perform: t_perfroutine, args: &mut [t_int]) {
        self.lock().chain.push((perform, args.to_vec()));
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
            s_next: std::ptr::null_mut(),
        })) as *mut t_symbol;
        state.symbols.insert(name.to_string(), symbol as usize);
        symbol
    }

    fn post(&self, message: &str) {
        self.lock().posts.push(message.to_string());
    }
}

impl MockPd {
    fn add_inlet(&self, owner: *mut t_object, kind: InletKind) -> *mut t_inlet {
        let mut state = self.lock();
        let handle = state.handle();
        let Some(object) = state.objects.get_mut(&(owner as usize)) else {
            return std::ptr::null_mut();
        };
        let position = object.created_inlets;
        object.created_inlets += 1;
        object.inlets.push(handle);
        state.inlets.insert(
            handle,
            MockInlet {
                owner: owner as usize,
                position,
                kind,
            },
        );
        handle as *mut t_inlet
    }

    fn record(&self, outlet: *mut t_outlet, message: Message) {
        let targets: Vec<(usize, usize)> = {
            let mut state = self.lock();
            let Some(record) = state.outlets.get(&(outlet as usize)) else {
                return;
            };
            let (object, handle) = (record.owner, outlet as usize);
            let position = state
                .objects
                .get(&object)
                .and_then(|o| o.outlets.iter().position(|h| *h == handle))
                .unwrap_or(record.position);
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
                Message::Int(value) => self.send_float(object, inlet, *value as f32),
                Message::Float(value) => self.send_float(object, inlet, *value as f32),
                Message::Symbol(symbol) => self.send_symbol(object, inlet, symbol.as_str()),
            }
        }
    }
}
