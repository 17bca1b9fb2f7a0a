//! Port Registry: the ordered inlets and outlets of one instance.
//!
//! Declaration order is load-bearing. It fixes each port's index, which is
//! both the numbered dispatch key and the left-to-right position on the
//! host object. Signal ports come first, created by [`PortRegistry::setup_io`].

use crate::binding::{DispatchStrategy, HostBinding, InletRequest, LayoutPorts, OutletRequest};
use crate::config::ClassConfig;
use crate::dispatch::DispatchTable;
use crate::error::{PortError, PortResult};
use crate::port::{Inlet, MessageKind, Outlet, PassiveFloat, PassiveStorage, PassiveSymbol};
use crate::types::MAX_CHANNELS;

/// Ordered ports of one instance plus the binding that creates their host side.
pub struct PortRegistry {
    inlets: Vec<Inlet>,
    outlets: Vec<Outlet>,
    in_channels: usize,
    out_channels: usize,
    io_declared: bool,
    laid_out: bool,
    table: DispatchTable,
    slot_capacity: usize,
    binding: Box<dyn HostBinding>,
}

impl PortRegistry {
    pub fn new(binding: Box<dyn HostBinding>, config: &ClassConfig) -> Self {
        Self {
            inlets: Vec::new(),
            outlets: Vec::new(),
            in_channels: 0,
            out_channels: 0,
            io_declared: false,
            laid_out: false,
            table: DispatchTable::new(),
            slot_capacity: config.max_control_inlets,
            binding,
        }
    }

    // =========================================================================
    // Declaration
    // =========================================================================

    /// Declare the signal inlets and outlets.
    ///
    /// Must be called at most once and before any control port.
    pub fn setup_io(&mut self, in_channels: usize, out_channels: usize) -> PortResult<()> {
        self.ensure_open()?;
        if self.io_declared {
            return Err(PortError::InvalidState("signal I/O already declared".into()));
        }
        if !self.inlets.is_empty() || !self.outlets.is_empty() {
            return Err(PortError::SignalAfterControl);
        }
        let requested = in_channels.max(out_channels);
        if requested > MAX_CHANNELS {
            return Err(PortError::TooManyChannels {
                requested,
                max: MAX_CHANNELS,
            });
        }

        for i in 0..in_channels {
            self.add_inlet_signal(&format!("SignalIn {}", i + 1))?;
        }
        for i in 0..out_channels {
            self.add_outlet_signal(&format!("SignalOut {}", i + 1))?;
        }
        self.in_channels = in_channels;
        self.out_channels = out_channels;
        self.io_declared = true;
        Ok(())
    }

    pub fn add_inlet_bang(&mut self, id: &str) -> PortResult<&Inlet> {
        self.push_inlet(id, MessageKind::Bang, None)
    }

    /// Active int inlet; values arrive through `int_received`.
    pub fn add_inlet_int(&mut self, id: &str) -> PortResult<&Inlet> {
        self.push_inlet(id, MessageKind::Int, None)
    }

    /// Active float inlet; values arrive through `float_received`.
    pub fn add_inlet_float(&mut self, id: &str) -> PortResult<&Inlet> {
        self.push_inlet(id, MessageKind::Float, None)
    }

    /// Passive float inlet writing into `storage`. No receiver is called.
    pub fn add_inlet_float_passive(&mut self, id: &str, storage: &PassiveFloat) -> PortResult<&Inlet> {
        self.push_inlet(
            id,
            MessageKind::Float,
            Some(PassiveStorage::Float(storage.clone())),
        )
    }

    pub fn add_inlet_symbol(&mut self, id: &str) -> PortResult<&Inlet> {
        self.push_inlet(id, MessageKind::Symbol, None)
    }

    /// Passive symbol inlet writing into `storage`. No receiver is called.
    pub fn add_inlet_symbol_passive(
        &mut self,
        id: &str,
        storage: &PassiveSymbol,
    ) -> PortResult<&Inlet> {
        self.push_inlet(
            id,
            MessageKind::Symbol,
            Some(PassiveStorage::Symbol(storage.clone())),
        )
    }

    /// Discrete outlet for bang, int, float and symbol sends.
    pub fn add_outlet(&mut self, id: &str) -> PortResult<&Outlet> {
        self.push_outlet(id, MessageKind::Control)
    }

    fn add_inlet_signal(&mut self, id: &str) -> PortResult<&Inlet> {
        self.push_inlet(id, MessageKind::Signal, None)
    }

    fn add_outlet_signal(&mut self, id: &str) -> PortResult<&Outlet> {
        self.push_outlet(id, MessageKind::Signal)
    }

    fn push_inlet(
        &mut self,
        id: &str,
        kind: MessageKind,
        passive: Option<PassiveStorage>,
    ) -> PortResult<&Inlet> {
        self.ensure_open()?;
        let index = self.inlets.len();

        let numbered = self.binding.strategy() == DispatchStrategy::NumberedSlots
            && !kind.is_signal()
            && passive.is_none();
        let slot = if numbered {
            Some(DispatchTable::slot_for(index, self.slot_capacity)?)
        } else {
            None
        };

        let handle = self.binding.bind_inlet(&InletRequest {
            index,
            id,
            kind,
            slot,
            passive: passive.as_ref(),
        })?;

        if let Some(slot) = slot {
            self.table.insert(self.binding.slot_kind(kind), slot);
        }

        let mut inlet = Inlet::new(index, id.to_string(), kind, slot, passive);
        if let Some(handle) = handle {
            inlet.attach(handle);
        }
        log::debug!("Declared {} inlet {} '{}'", kind, index, id);
        self.inlets.push(inlet);
        Ok(&self.inlets[index])
    }

    fn push_outlet(&mut self, id: &str, kind: MessageKind) -> PortResult<&Outlet> {
        self.ensure_open()?;
        let index = self.outlets.len();
        let handle = self
            .binding
            .bind_outlet(&OutletRequest { index, id, kind })?;

        let mut outlet = Outlet::new(index, id.to_string(), kind);
        if let Some(handle) = handle {
            outlet.attach(handle);
        }
        log::debug!("Declared {} outlet {} '{}'", kind, index, id);
        self.outlets.push(outlet);
        Ok(&self.outlets[index])
    }

    fn ensure_open(&self) -> PortResult<()> {
        if self.laid_out {
            return Err(PortError::InvalidState(
                "ports cannot be declared after layout".into(),
            ));
        }
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[inline]
    pub fn inlets(&self) -> &[Inlet] {
        &self.inlets
    }

    #[inline]
    pub fn outlets(&self) -> &[Outlet] {
        &self.outlets
    }

    pub fn inlet(&self, index: usize) -> Option<&Inlet> {
        self.inlets.get(index)
    }

    pub fn outlet(&self, index: usize) -> Option<&Outlet> {
        self.outlets.get(index)
    }

    /// Number of signal inlets.
    #[inline]
    pub fn in_channel_count(&self) -> usize {
        self.in_channels
    }

    /// Number of signal outlets.
    #[inline]
    pub fn out_channel_count(&self) -> usize {
        self.out_channels
    }

    #[inline]
    pub fn has_signal(&self) -> bool {
        self.in_channels + self.out_channels > 0
    }

    pub fn dispatch_table(&self) -> &DispatchTable {
        &self.table
    }

    pub fn strategy(&self) -> DispatchStrategy {
        self.binding.strategy()
    }

    /// Returns true once layout has run.
    pub fn is_laid_out(&self) -> bool {
        self.laid_out
    }

    /// Print to the host console.
    pub fn post(&self, message: &str) {
        self.binding.post(message);
    }

    // =========================================================================
    // Lifecycle hooks
    // =========================================================================

    pub(crate) fn layout(&mut self) -> PortResult<()> {
        self.ensure_open()?;
        let mut ports = LayoutPorts::new(
            &mut self.inlets,
            &mut self.outlets,
            self.in_channels,
            self.out_channels,
        );
        self.binding.layout(&mut ports)?;
        self.laid_out = true;
        log::debug!(
            "Laid out {} inlets, {} outlets",
            self.inlets.len(),
            self.outlets.len()
        );
        Ok(())
    }

    /// Pull host-written passive values into their shared cells.
    pub(crate) fn sync_passive(&self) {
        for inlet in &self.inlets {
            inlet.sync_passive();
        }
    }

    /// Release every port: inlets first, then outlets, each in declaration order.
    pub(crate) fn clear(&mut self) {
        for inlet in self.inlets.drain(..) {
            drop(inlet);
        }
        for outlet in self.outlets.drain(..) {
            drop(outlet);
        }
        self.table = DispatchTable::new();
    }
}

impl std::fmt::Debug for PortRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortRegistry")
            .field("inlets", &self.inlets)
            .field("outlets", &self.outlets)
            .field("in_channels", &self.in_channels)
            .field("out_channels", &self.out_channels)
            .field("strategy", &self.binding.strategy())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Event, RecordingBinding};

    fn registry(strategy: DispatchStrategy) -> (PortRegistry, RecordingBinding) {
        let binding = RecordingBinding::new(strategy);
        let registry = PortRegistry::new(Box::new(binding.clone()), &ClassConfig::new("test"));
        (registry, binding)
    }

    #[test]
    fn test_index_matches_position() {
        let (mut ports, _) = registry(DispatchStrategy::NumberedSlots);
        assert_eq!(ports.add_inlet_bang("a").unwrap().index(), 0);
        assert_eq!(ports.add_inlet_float("b").unwrap().index(), 1);
        assert_eq!(ports.add_inlet_symbol("c").unwrap().index(), 2);
        assert_eq!(ports.add_inlet_int("d").unwrap().index(), 3);
        for (pos, inlet) in ports.inlets().iter().enumerate() {
            assert_eq!(inlet.index(), pos);
        }
        assert_eq!(ports.add_outlet("o").unwrap().index(), 0);
    }

    #[test]
    fn test_signal_ports_come_first() {
        let (mut ports, _) = registry(DispatchStrategy::NumberedSlots);
        ports.setup_io(2, 1).unwrap();
        let balance = ports.add_inlet_float("balance").unwrap();
        assert_eq!(balance.index(), 2);
        assert_eq!(balance.slot(), Some(3));

        let kinds: Vec<_> = ports.inlets().iter().map(Inlet::kind).collect();
        assert_eq!(
            kinds,
            vec![MessageKind::Signal, MessageKind::Signal, MessageKind::Float]
        );
        assert_eq!(ports.inlets()[0].id(), "SignalIn 1");
        assert_eq!(ports.outlets()[0].id(), "SignalOut 1");
        assert_eq!(ports.in_channel_count(), 2);
        assert_eq!(ports.out_channel_count(), 1);
    }

    #[test]
    fn test_signal_after_control_rejected() {
        let (mut ports, _) = registry(DispatchStrategy::ProxyIndex);
        ports.add_inlet_bang("bang").unwrap();
        assert_eq!(ports.setup_io(1, 1), Err(PortError::SignalAfterControl));
    }

    #[test]
    fn test_setup_io_twice_rejected() {
        let (mut ports, _) = registry(DispatchStrategy::ProxyIndex);
        ports.setup_io(0, 0).unwrap();
        assert!(matches!(ports.setup_io(1, 1), Err(PortError::InvalidState(_))));
    }

    #[test]
    fn test_too_many_channels() {
        let (mut ports, _) = registry(DispatchStrategy::ProxyIndex);
        assert_eq!(
            ports.setup_io(MAX_CHANNELS + 1, 1),
            Err(PortError::TooManyChannels {
                requested: MAX_CHANNELS + 1,
                max: MAX_CHANNELS
            })
        );
    }

    #[test]
    fn test_slot_overflow_fails_fast() {
        let binding = RecordingBinding::new(DispatchStrategy::NumberedSlots);
        let config = ClassConfig::new("test").with_max_control_inlets(2);
        let mut ports = PortRegistry::new(Box::new(binding), &config);
        ports.add_inlet_bang("1").unwrap();
        ports.add_inlet_bang("2").unwrap();
        assert_eq!(
            ports.add_inlet_bang("3").unwrap_err(),
            PortError::ConfigurationOverflow {
                capacity: 2,
                requested: 3
            }
        );
        assert_eq!(ports.inlets().len(), 2);
    }

    #[test]
    fn test_proxy_strategy_has_no_slots() {
        let binding = RecordingBinding::new(DispatchStrategy::ProxyIndex);
        let config = ClassConfig::new("test").with_max_control_inlets(1);
        let mut ports = PortRegistry::new(Box::new(binding), &config);
        for i in 0..4 {
            assert_eq!(ports.add_inlet_float(&i.to_string()).unwrap().slot(), None);
        }
        assert!(ports.dispatch_table().is_empty());
    }

    #[test]
    fn test_passive_inlets_take_no_slot() {
        let (mut ports, _) = registry(DispatchStrategy::NumberedSlots);
        let cell = PassiveFloat::new(0.0);
        let inlet = ports.add_inlet_float_passive("p", &cell).unwrap();
        assert!(inlet.is_passive());
        assert_eq!(inlet.slot(), None);
        assert!(ports.dispatch_table().is_empty());
    }

    #[test]
    fn test_int_slot_uses_binding_kind() {
        let binding = RecordingBinding::new(DispatchStrategy::NumberedSlots)
            .with_slot_kind(MessageKind::Int, MessageKind::Float);
        let mut ports = PortRegistry::new(Box::new(binding), &ClassConfig::new("test"));
        ports.add_inlet_int("n").unwrap();
        assert_eq!(ports.dispatch_table().resolve(MessageKind::Float, 1), Some(0));
        assert_eq!(ports.dispatch_table().resolve(MessageKind::Int, 1), None);
    }

    #[test]
    fn test_no_ports_after_layout() {
        let (mut ports, _) = registry(DispatchStrategy::ProxyIndex);
        ports.layout().unwrap();
        assert!(matches!(
            ports.add_inlet_bang("late"),
            Err(PortError::InvalidState(_))
        ));
    }

    #[test]
    fn test_clear_releases_in_order() {
        let (mut ports, binding) = registry(DispatchStrategy::NumberedSlots);
        ports.setup_io(1, 1).unwrap();
        ports.add_inlet_bang("b").unwrap();
        ports.add_outlet("o").unwrap();
        binding.take_events();

        ports.clear();
        assert_eq!(
            binding.take_events(),
            vec![
                Event::ReleaseInlet(0),
                Event::ReleaseInlet(1),
                Event::ReleaseOutlet(0),
                Event::ReleaseOutlet(1),
            ]
        );
        assert!(ports.inlets().is_empty());
        assert!(ports.dispatch_table().is_empty());
    }
}
