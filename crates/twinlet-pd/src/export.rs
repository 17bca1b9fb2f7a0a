//! Export macro for Pd externals.

/// Generate the setup function Pd looks up when loading the external.
///
/// Pd derives the symbol from the object name: `balance~` becomes
/// `balance_tilde_setup`. The symbol name is passed explicitly.
///
/// # Arguments
///
/// * `$config` - A static [`ClassConfig`](twinlet_core::ClassConfig)
/// * `$external` - The type implementing [`External`](twinlet_core::External)
/// * `$setup` - Name of the generated setup function
///
/// # Example
///
/// ```rust,ignore
/// use twinlet_core::ClassConfig;
/// use twinlet_pd::export_pd;
///
/// static CONFIG: ClassConfig = ClassConfig::new("balance_tilde");
///
/// export_pd!(CONFIG, Balance, balance_tilde_setup);
/// ```
#[macro_export]
macro_rules! export_pd {
    ($config:expr, $external:ty, $setup:ident) => {
        #[no_mangle]
        pub extern "C" fn $setup() {
            $crate::factory::setup::<$external>(&$config);
        }
    };
}
