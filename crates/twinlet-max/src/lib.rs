//! Twinlet Max - Max/MSP host binding.
//!
//! Registers one Max class per external and drives its
//! [`ExternalInstance`](twinlet_core::ExternalInstance) from Max's entry
//! points:
//!
//! - one method per message kind serves every inlet; proxies report the
//!   inlet index, see [`MaxBinding`]
//! - every host port is created at layout, right to left
//! - signal processing runs in `f64` from `perform64`
//!
//! Passive inlets have no Max counterpart. They become proxies whose
//! values are stored without calling a receiver.
//!
//! Use [`export_max!`] to generate `ext_main`.

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

pub use api::{MaxApi, MaxMethod};
pub use binding::MaxBinding;
pub use class::MaxClass;
pub use error::{MaxError, MaxResult};
pub use host::MaxHost;
pub use object::MaxObject;
