//! The live Max API, resolved from the running process.

use std::ffi::{c_char, c_long, c_short, c_void, CString};

use crate::api::{MaxApi, MaxMethod};
use crate::error::MaxResult;
use crate::sys::{
    method, t_atom, t_atom_long, t_class, t_max_err, t_object, t_pxobject, t_symbol, t_word,
    FreeMethod, NewMethod, Perform64Method, A_CANT, A_FLOAT, A_GIMME, A_LONG, A_NOTHING, A_SYM,
    CLASS_BOX,
};

type ClassNewFn = unsafe extern "C" fn(
    *const c_char,
    method,
    method,
    c_long,
    *const c_void,
    c_short, ...
) -> *mut t_class;
type ClassAddMethodFn = unsafe extern "C" fn(*mut t_class, method, *const c_char, ...) -> t_max_err;
type ClassDspInitFn = unsafe extern "C" fn(*mut t_class);
type ClassRegisterFn = unsafe extern "C" fn(*mut t_symbol, *mut t_class) -> t_max_err;
type ObjectAllocFn = unsafe extern "C" fn(*mut t_class) -> *mut c_void;
type ObjectFreeFn = unsafe extern "C" fn(*mut c_void) -> t_max_err;
type ProxyNewFn = unsafe extern "C" fn(*mut c_void, c_long, *mut c_long) -> *mut c_void;
type ProxyGetInletFn = unsafe extern "C" fn(*mut t_object) -> c_long;
type DspSetupFn = unsafe extern "C" fn(*mut t_pxobject, c_long);
type DspFreeFn = unsafe extern "C" fn(*mut t_pxobject);
type OutletNewFn = unsafe extern "C" fn(*mut c_void, *const c_char) -> *mut c_void;
type OutletDeleteFn = unsafe extern "C" fn(*mut c_void);
type OutletBangFn = unsafe extern "C" fn(*mut c_void) -> *mut c_void;
type OutletIntFn = unsafe extern "C" fn(*mut c_void, t_atom_long) -> *mut c_void;
type OutletFloatFn = unsafe extern "C" fn(*mut c_void, f64) -> *mut c_void;
type OutletAnythingFn =
    unsafe extern "C" fn(*mut c_void, *mut t_symbol, c_short, *mut t_atom) -> *mut c_void;
type ObjectMethodFn = unsafe extern "C" fn(*mut c_void, *mut t_symbol, ...) -> *mut c_void;
type GensymFn = unsafe extern "C" fn(*const c_char) -> *mut t_symbol;
type PostFn = unsafe extern "C" fn(*const c_char, ...);

macro_rules! resolve {
    ($lib:expr, $ty:ty, $name:literal) => {
        // SAFETY: the symbol is the Max function with the declared signature.
        unsafe { *$lib.get::<$ty>(concat!($name, "\0").as_bytes())? }
    };
}

/// Function table of the running Max.
pub struct MaxHost {
    class_new: ClassNewFn,
    class_addmethod: ClassAddMethodFn,
    class_dspinit: ClassDspInitFn,
    class_register: ClassRegisterFn,
    object_alloc: ObjectAllocFn,
    object_free: ObjectFreeFn,
    proxy_new: ProxyNewFn,
    proxy_getinlet: ProxyGetInletFn,
    dsp_setup: DspSetupFn,
    dsp_free: DspFreeFn,
    outlet_new: OutletNewFn,
    outlet_delete: OutletDeleteFn,
    outlet_bang: OutletBangFn,
    outlet_int: OutletIntFn,
    outlet_float: OutletFloatFn,
    outlet_anything: OutletAnythingFn,
    object_method: ObjectMethodFn,
    gensym: GensymFn,
    post: PostFn,
    _library: libloading::Library,
}

impl MaxHost {
    /// Resolve the API from the host process.
    pub fn load() -> MaxResult<Self> {
        let library = open_host()?;
        let host = Self {
            class_new: resolve!(library, ClassNewFn, "class_new"),
            class_addmethod: resolve!(library, ClassAddMethodFn, "class_addmethod"),
            class_dspinit: resolve!(library, ClassDspInitFn, "class_dspinit"),
            class_register: resolve!(library, ClassRegisterFn, "class_register"),
            object_alloc: resolve!(library, ObjectAllocFn, "object_alloc"),
            object_free: resolve!(library, ObjectFreeFn, "object_free"),
            proxy_new: resolve!(library, ProxyNewFn, "proxy_new"),
            proxy_getinlet: resolve!(library, ProxyGetInletFn, "proxy_getinlet"),
            dsp_setup: resolve!(library, DspSetupFn, "dsp_setup"),
            dsp_free: resolve!(library, DspFreeFn, "dsp_free"),
            outlet_new: resolve!(library, OutletNewFn, "outlet_new"),
            outlet_delete: resolve!(library, OutletDeleteFn, "outlet_delete"),
            outlet_bang: resolve!(library, OutletBangFn, "outlet_bang"),
            outlet_int: resolve!(library, OutletIntFn, "outlet_int"),
            outlet_float: resolve!(library, OutletFloatFn, "outlet_float"),
            outlet_anything: resolve!(library, OutletAnythingFn, "outlet_anything"),
            object_method: resolve!(library, ObjectMethodFn, "object_method"),
            gensym: resolve!(library, GensymFn, "gensym"),
            post: resolve!(library, PostFn, "post"),
            _library: library,
        };
        log::debug!("Resolved Max API from host process");
        Ok(host)
    }
}

#[cfg(unix)]
fn open_host() -> MaxResult<libloading::Library> {
    Ok(libloading::os::unix::Library::this().into())
}

#[cfg(windows)]
fn open_host() -> MaxResult<libloading::Library> {
    Ok(libloading::os::windows::Library::open_already_loaded("MaxAPI.dll")?.into())
}

fn c_string(s: &str) -> CString {
    CString::new(s).unwrap_or_default()
}

impl MaxApi for MaxHost {
    unsafe fn class_new(
        &self,
        name: &str,
        new_method: NewMethod,
        free_method: FreeMethod,
        size: usize,
    ) -> *mut t_class {
        let name = c_string(name);
        (self.class_new)(
            name.as_ptr(),
            std::mem::transmute::<NewMethod, method>(new_method),
            std::mem::transmute::<FreeMethod, method>(free_method),
            size as c_long,
            std::ptr::null(),
            A_GIMME,
            A_NOTHING as i32,
        )
    }

    unsafe fn class_add_method(&self, class: *mut t_class, name: &str, method: MaxMethod) {
        let name = c_string(name);
        let _ = match method {
            MaxMethod::Bang(m) => {
                (self.class_addmethod)(class, std::mem::transmute(m), name.as_ptr(), 0i32)
            }
            MaxMethod::Int(m) => (self.class_addmethod)(
                class,
                std::mem::transmute(m),
                name.as_ptr(),
                A_LONG as i32,
                0i32,
            ),
            MaxMethod::Float(m) => (self.class_addmethod)(
                class,
                std::mem::transmute(m),
                name.as_ptr(),
                A_FLOAT as i32,
                0i32,
            ),
            MaxMethod::Symbol(m) => (self.class_addmethod)(
                class,
                std::mem::transmute(m),
                name.as_ptr(),
                A_SYM as i32,
                0i32,
            ),
            MaxMethod::Dsp64(m) => (self.class_addmethod)(
                class,
                std::mem::transmute(m),
                name.as_ptr(),
                A_CANT as i32,
                0i32,
            ),
        };
    }

    unsafe fn class_dspinit(&self, class: *mut t_class) {
        (self.class_dspinit)(class)
    }

    unsafe fn class_register(&self, class: *mut t_class) -> bool {
        (self.class_register)(self.gensym(CLASS_BOX), class) == 0
    }

    unsafe fn object_alloc(&self, class: *mut t_class) -> *mut t_object {
        (self.object_alloc)(class) as *mut t_object
    }

    unsafe fn object_free(&self, object: *mut c_void) {
        let _ = (self.object_free)(object);
    }

    unsafe fn proxy_new(
        &self,
        owner: *mut t_object,
        id: c_long,
        stuffloc: *mut c_long,
    ) -> *mut c_void {
        (self.proxy_new)(owner as *mut c_void, id, stuffloc)
    }

    unsafe fn proxy_getinlet(&self, owner: *mut t_object) -> c_long {
        (self.proxy_getinlet)(owner)
    }

    unsafe fn dsp_setup(&self, owner: *mut t_pxobject, signal_inlets: c_long) {
        (self.dsp_setup)(owner, signal_inlets)
    }

    unsafe fn dsp_free(&self, owner: *mut t_pxobject) {
        (self.dsp_free)(owner)
    }

    unsafe fn outlet_new(&self, owner: *mut t_object, kind: Option<&str>) -> *mut c_void {
        let kind = kind.map(c_string);
        let kind_ptr = kind.as_ref().map_or(std::ptr::null(), |k| k.as_ptr());
        (self.outlet_new)(owner as *mut c_void, kind_ptr)
    }

    unsafe fn outlet_delete(&self, outlet: *mut c_void) {
        (self.outlet_delete)(outlet)
    }

    unsafe fn outlet_bang(&self, outlet: *mut c_void) {
        (self.outlet_bang)(outlet);
    }

    unsafe fn outlet_int(&self, outlet: *mut c_void, value: t_atom_long) {
        (self.outlet_int)(outlet, value);
    }

    unsafe fn outlet_float(&self, outlet: *mut c_void, value: f64) {
        (self.outlet_float)(outlet, value);
    }

    unsafe fn outlet_symbol(&self, outlet: *mut c_void, symbol: &str) {
        let mut atom = t_atom {
            a_type: A_SYM,
            a_w: t_word {
                w_sym: self.gensym(symbol),
            },
        };
        (self.outlet_anything)(outlet, self.gensym("symbol"), 1, &mut atom);
    }

    unsafe fn dsp_add64(
        &self,
        dsp64: *mut t_object,
        owner: *mut t_object,
        perform: Perform64Method,
    ) {
        (self.object_method)(
            dsp64 as *mut c_void,
            self.gensym("dsp_add64"),
            owner,
            perform,
            0 as c_long,
            std::ptr::null_mut::<c_void>(),
        );
    }

    fn gensym(&self, name: &str) -> *mut t_symbol {
        let name = c_string(name);
        // SAFETY: gensym copies the string into Max's symbol table.
        unsafe { (self.gensym)(name.as_ptr()) }
    }

    fn post(&self, message: &str) {
        let message = c_string(message);
        // SAFETY: "%s" consumes exactly one string argument.
        unsafe { (self.post)(c"%s".as_ptr(), message.as_ptr()) }
    }
}
