//! The trait every external implements.

use crate::atom::{Atom, Symbol};
use crate::buffer::Buffer;
use crate::error::ExternalResult;
use crate::port::{Inlet, Outlet};
use crate::registry::PortRegistry;
use crate::sample::Sample;

/// An object that runs inside Pd or Max.
///
/// One value exists per host object. The host serializes every call on it,
/// so no method needs to be thread-safe.
///
/// Receivers are optional and default to doing nothing. Outlets are passed
/// in because the registry, not the external, owns the ports.
///
/// # Example
///
/// ```ignore
/// #[derive(Default)]
/// struct Gain {
///     gain: f64,
/// }
///
/// impl External for Gain {
///     fn setup(&mut self, ports: &mut PortRegistry, args: &[Atom]) -> ExternalResult<()> {
///         self.gain = args.first().map(Atom::float).unwrap_or(1.0);
///         ports.setup_io(1, 1)?;
///         ports.add_inlet_float("gain")?;
///         Ok(())
///     }
///
///     fn float_received(&mut self, _inlet: &Inlet, value: f64, _outlets: &[Outlet]) {
///         self.gain = value;
///     }
///
///     fn process<S: Sample>(&mut self, buffer: &mut Buffer<S>) {
///         let gain = S::from_f64(self.gain);
///         for (input, output) in buffer.zip_channels() {
///             for (i, o) in input.iter().zip(output.iter_mut()) {
///                 *o = *i * gain;
///             }
///         }
///     }
/// }
/// ```
pub trait External: Default + 'static {
    /// Declare ports and read creation arguments.
    ///
    /// Called once, before layout. Ports must be declared in a fixed order:
    /// numbered dispatch binds by position.
    fn setup(&mut self, ports: &mut PortRegistry, args: &[Atom]) -> ExternalResult<()>;

    /// Called after every port has been released.
    fn exit(&mut self) {}

    /// Render one block of signal data.
    fn process<S: Sample>(&mut self, buffer: &mut Buffer<'_, S>) {
        let _ = buffer;
    }

    fn bang_received(&mut self, inlet: &Inlet, outlets: &[Outlet]) {
        let _ = (inlet, outlets);
    }

    fn int_received(&mut self, inlet: &Inlet, value: i64, outlets: &[Outlet]) {
        let _ = (inlet, value, outlets);
    }

    fn float_received(&mut self, inlet: &Inlet, value: f64, outlets: &[Outlet]) {
        let _ = (inlet, value, outlets);
    }

    fn symbol_received(&mut self, inlet: &Inlet, symbol: &Symbol, outlets: &[Outlet]) {
        let _ = (inlet, symbol, outlets);
    }
}
