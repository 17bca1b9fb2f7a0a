//! Export macro for Max externals.

/// Generate the `ext_main` entry point Max calls when loading the external.
///
/// # Example
///
/// ```rust,ignore
/// use twinlet_core::ClassConfig;
/// use twinlet_max::export_max;
///
/// static CONFIG: ClassConfig = ClassConfig::new("balance_tilde");
///
/// export_max!(CONFIG, Balance);
/// ```
#[macro_export]
macro_rules! export_max {
    ($config:expr, $external:ty) => {
        #[no_mangle]
        pub extern "C" fn ext_main(_r: *mut ::std::ffi::c_void) {
            $crate::factory::setup::<$external>(&$config);
        }
    };
}
