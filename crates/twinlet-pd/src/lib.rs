//! Twinlet Pd - Pure Data host binding.
//!
//! Registers one Pd class per external and drives its
//! [`ExternalInstance`](twinlet_core::ExternalInstance) from Pd's entry
//! points:
//!
//! - control messages arrive on per-slot methods (`ext_floatin_3`), see
//!   [`PdBinding`]
//! - passive inlets write into host cells that are synced before every
//!   dispatch and render block
//! - signal processing runs from a `dsp_add`ed perform routine in `f32`
//!
//! Use [`export_pd!`] to generate the setup function Pd looks up.
//!
//! # Example
//!
//! ```rust,ignore
//! use twinlet_core::ClassConfig;
//!
//! pub static CONFIG: ClassConfig = ClassConfig::new("balance_tilde");
//!
//! twinlet_pd::export_pd!(CONFIG, Balance, balance_tilde_setup);
//! ```

pub mod api;
pub mod binding;
pub mod class;
pub mod error;
pub mod export;
pub mod factory;
mod handle;
pub mod host;
mod object;
pub mod sys;
mod trampoline;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use api::{PdApi, PdMethod};
pub use binding::PdBinding;
pub use class::PdClass;
pub use error::{PdError, PdResult};
pub use host::PdHost;
pub use object::PdObject;
pub use trampoline::MAX_SLOTS;
