//! The live Pd API, resolved from the running process.
//!
//! Pd loads externals into its own process, so every API symbol is already
//! present. Resolving them at load time instead of linking against them
//! keeps the crate linkable without Pd.

use std::ffi::{c_char, c_int, c_void, CString};

use crate::api::{PdApi, PdMethod};
use crate::error::PdResult;
use crate::sys::{
    t_class, t_float, t_inlet, t_int, t_method, t_newmethod, t_object, t_outlet, t_perfroutine,
    t_symbol, FreeMethod, NewMethod, A_CANT, A_FLOAT, A_GIMME, A_NULL, A_SYMBOL, CLASS_NOINLET,
};

type ClassNewFn = unsafe extern "C" fn(
    *mut t_symbol,
    t_newmethod,
    t_method,
    usize,
    c_int,
    c_int, ...
) -> *mut t_class;
type ClassAddMethodFn = unsafe extern "C" fn(*mut t_class, t_method, *mut t_symbol, c_int, ...);
type PdNewFn = unsafe extern "C" fn(*mut t_class) -> *mut c_void;
type PdFreeFn = unsafe extern "C" fn(*mut c_void);
type InletNewFn =
    unsafe extern "C" fn(*mut t_object, *mut c_void, *mut t_symbol, *mut t_symbol) -> *mut t_inlet;
type FloatInletNewFn = unsafe extern "C" fn(*mut t_object, *mut t_float) -> *mut t_inlet;
type SymbolInletNewFn = unsafe extern "C" fn(*mut t_object, *mut *mut t_symbol) -> *mut t_inlet;
type InletFreeFn = unsafe extern "C" fn(*mut t_inlet);
type OutletNewFn = unsafe extern "C" fn(*mut t_object, *mut t_symbol) -> *mut t_outlet;
type OutletFreeFn = unsafe extern "C" fn(*mut t_outlet);
type OutletBangFn = unsafe extern "C" fn(*mut t_outlet);
type OutletFloatFn = unsafe extern "C" fn(*mut t_outlet, t_float);
type OutletSymbolFn = unsafe extern "C" fn(*mut t_outlet, *mut t_symbol);
type DspAddvFn = unsafe extern "C" fn(t_perfroutine, c_int, *mut t_int);
type GensymFn = unsafe extern "C" fn(*const c_char) -> *mut t_symbol;
type PostFn = unsafe extern "C" fn(*const c_char, ...);

macro_rules! resolve {
    ($lib:expr, $ty:ty, $name:literal) => {
        // SAFETY: the symbol is the Pd function with the declared signature.
        unsafe { *$lib.get::<$ty>(concat!($name, "\0").as_bytes())? }
    };
}

/// Function table of the running Pd.
pub struct PdHost {
    class_new: ClassNewFn,
    class_addmethod: ClassAddMethodFn,
    pd_new: PdNewFn,
    pd_free: PdFreeFn,
    inlet_new: InletNewFn,
    floatinlet_new: FloatInletNewFn,
    symbolinlet_new: SymbolInletNewFn,
    inlet_free: InletFreeFn,
    outlet_new: OutletNewFn,
    outlet_free: OutletFreeFn,
    outlet_bang: OutletBangFn,
    outlet_float: OutletFloatFn,
    outlet_symbol: OutletSymbolFn,
    dsp_addv: DspAddvFn,
    gensym: GensymFn,
    post: PostFn,
    _library: libloading::Library,
}

impl PdHost {
    /// Resolve the API from the host process.
    pub fn load() -> PdResult<Self> {
        let library = open_host()?;
        let host = Self {
            class_new: resolve!(library, ClassNewFn, "class_new"),
            class_addmethod: resolve!(library, ClassAddMethodFn, "class_addmethod"),
            pd_new: resolve!(library, PdNewFn, "pd_new"),
            pd_free: resolve!(library, PdFreeFn, "pd_free"),
            inlet_new: resolve!(library, InletNewFn, "inlet_new"),
            floatinlet_new: resolve!(library, FloatInletNewFn, "floatinlet_new"),
            symbolinlet_new: resolve!(library, SymbolInletNewFn, "symbolinlet_new"),
            inlet_free: resolve!(library, InletFreeFn, "inlet_free"),
            outlet_new: resolve!(library, OutletNewFn, "outlet_new"),
            outlet_free: resolve!(library, OutletFreeFn, "outlet_free"),
            outlet_bang: resolve!(library, OutletBangFn, "outlet_bang"),
            outlet_float: resolve!(library, OutletFloatFn, "outlet_float"),
            outlet_symbol: resolve!(library, OutletSymbolFn, "outlet_symbol"),
            dsp_addv: resolve!(library, DspAddvFn, "dsp_addv"),
            gensym: resolve!(library, GensymFn, "gensym"),
            post: resolve!(library, PostFn, "post"),
            _library: library,
        };
        log::debug!("Resolved Pd API from host process");
        Ok(host)
    }
}

#[cfg(unix)]
fn open_host() -> PdResult<libloading::Library> {
    Ok(libloading::os::unix::Library::this().into())
}

#[cfg(windows)]
fn open_host() -> PdResult<libloading::Library> {
    Ok(libloading::os::windows::Library::open_already_loaded("pd.dll")?.into())
}

fn c_string(s: &str) -> CString {
    CString::new(s).unwrap_or_default()
}

impl PdApi for PdHost {
    unsafe fn class_new(
        &self,
        name: &str,
        new_method: NewMethod,
        free_method: FreeMethod,
        size: usize,
    ) -> *mut t_class {
        let new_method = std::mem::transmute::<NewMethod, t_newmethod>(new_method);
        let free_method = std::mem::transmute::<FreeMethod, t_method>(free_method);
        (self.class_new)(
            self.gensym(name),
            new_method,
            free_method,
            size,
            CLASS_NOINLET,
            A_GIMME,
            A_NULL,
        )
    }

    unsafe fn class_add_method(&self, class: *mut t_class, selector: &str, method: PdMethod) {
        let selector = self.gensym(selector);
        match method {
            PdMethod::Bang(m) => (self.class_addmethod)(
                class,
                std::mem::transmute::<_, t_method>(m),
                selector,
                A_NULL,
            ),
            PdMethod::Float(m) => (self.class_addmethod)(
                class,
                std::mem::transmute::<_, t_method>(m),
                selector,
                A_FLOAT,
                A_NULL,
            ),
            PdMethod::Symbol(m) => (self.class_addmethod)(
                class,
                std::mem::transmute::<_, t_method>(m),
                selector,
                A_SYMBOL,
                A_NULL,
            ),
            PdMethod::Dsp(m) => (self.class_addmethod)(
                class,
                std::mem::transmute::<_, t_method>(m),
                selector,
                A_CANT,
                A_NULL,
            ),
        }
    }

    unsafe fn pd_new(&self, class: *mut t_class) -> *mut t_object {
        (self.pd_new)(class) as *mut t_object
    }

    unsafe fn pd_free(&self, object: *mut t_object) {
        (self.pd_free)(object as *mut c_void)
    }

    unsafe fn inlet_new(&self, owner: *mut t_object, kind: &str, selector: &str) -> *mut t_inlet {
        // The owner's t_pd header is its first field.
        (self.inlet_new)(
            owner,
            owner as *mut c_void,
            self.gensym(kind),
            self.gensym(selector),
        )
    }

    unsafe fn float_inlet_new(&self, owner: *mut t_object, cell: *mut t_float) -> *mut t_inlet {
        (self.floatinlet_new)(owner, cell)
    }

    unsafe fn symbol_inlet_new(
        &self,
        owner: *mut t_object,
        cell: *mut *mut t_symbol,
    ) -> *mut t_inlet {
        (self.symbolinlet_new)(owner, cell)
    }

    unsafe fn inlet_free(&self, inlet: *mut t_inlet) {
        (self.inlet_free)(inlet)
    }

    unsafe fn outlet_new(&self, owner: *mut t_object, kind: Option<&str>) -> *mut t_outlet {
        let kind = kind.map_or(std::ptr::null_mut(), |k| self.gensym(k));
        (self.outlet_new)(owner, kind)
    }

    unsafe fn outlet_free(&self, outlet: *mut t_outlet) {
        (self.outlet_free)(outlet)
    }

    unsafe fn outlet_bang(&self, outlet: *mut t_outlet) {
        (self.outlet_bang)(outlet)
    }

    unsafe fn outlet_float(&self, outlet: *mut t_outlet, value: t_float) {
        (self.outlet_float)(outlet, value)
    }

    unsafe fn outlet_symbol(&self, outlet: *mut t_outlet, symbol: &str) {
        (self.outlet_symbol)(outlet, self.gensym(symbol))
    }

    unsafe fn dsp_add(&self, perform: t_perfroutine, args: &mut [t_int]) {
        (self.dsp_addv)(perform, args.len() as c_int, args.as_mut_ptr())
    }

    fn gensym(&self, name: &str) -> *mut t_symbol {
        let name = c_string(name);
        // SAFETY: gensym copies the string into Pd's symbol table.
        unsafe { (self.gensym)(name.as_ptr()) }
    }

    fn post(&self, message: &str) {
        let message = c_string(message);
        // SAFETY: "%s" consumes exactly one string argument.
        unsafe { (self.post)(c"%s".as_ptr(), message.as_ptr()) }
    }
}
