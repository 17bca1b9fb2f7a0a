//! # Twinlet
//!
//! Pd and Max externals in Rust.
//!
//! Twinlet lets one object implementation run unmodified inside Pure Data and
//! Max/MSP. An external declares its ports once; each host binding maps them
//! onto that host's dispatch mechanism and render graph.
//!
//! ## Architecture
//!
//! ```text
//! Your external (implements External)
//!        ↓
//! ExternalInstance<E> (ports, dispatch, audio vectors)
//!        ↓
//! HostBinding
//!   ├── PdBinding  (numbered slots, dsp_add)
//!   └── MaxBinding (proxy inlets, perform64)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use twinlet::prelude::*;
//!
//! #[derive(Default)]
//! struct Balance {
//!     balance: f64,
//! }
//!
//! impl External for Balance {
//!     fn setup(&mut self, ports: &mut PortRegistry, _args: &[Atom]) -> ExternalResult<()> {
//!         ports.setup_io(2, 1)?;
//!         ports.add_inlet_float("balance")?;
//!         Ok(())
//!     }
//!
//!     fn float_received(&mut self, _inlet: &Inlet, value: f64, _outlets: &[Outlet]) {
//!         self.balance = value;
//!     }
//! }
//!
//! static CONFIG: ClassConfig = ClassConfig::new("balance_tilde");
//!
//! export_pd!(CONFIG, Balance, balance_tilde_setup);
//! export_max!(CONFIG, Balance);
//! ```

// Re-export sub-crates
pub use twinlet_core as core;
#[cfg(feature = "max")]
pub use twinlet_max as max;
#[cfg(feature = "pd")]
pub use twinlet_pd as pd;

#[cfg(feature = "max")]
pub use twinlet_max::export_max;
#[cfg(feature = "pd")]
pub use twinlet_pd::export_pd;

/// Prelude module for convenient imports.
///
/// Import everything you need to build an external:
/// ```rust,ignore
/// use twinlet::prelude::*;
/// ```
pub mod prelude {
    pub use twinlet_core::{
        // Traits
        External, Sample,
        // Ports
        Inlet, MessageKind, Outlet, PortRegistry,
        // Passive storage
        PassiveFloat, PassiveSymbol,
        // Messages and creation arguments
        Atom, Message, Symbol,
        // Signal buffers
        Buffer,
        // Configuration
        ClassConfig,
        // Error types
        ExternalError, ExternalResult, PortError, PortResult,
    };

    #[cfg(feature = "max")]
    pub use twinlet_max::export_max;
    #[cfg(feature = "pd")]
    pub use twinlet_pd::export_pd;
}
