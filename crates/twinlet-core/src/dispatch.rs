//! Dispatch Core: host event to inlet to receiver.
//!
//! Numbered-slot hosts register one entry point per (kind, slot) and the
//! [`DispatchTable`] maps it back to an inlet. Proxy hosts report the inlet
//! index directly and the kind is checked against the inlet before the
//! receiver runs. Both paths end in [`deliver`].

use crate::error::{DispatchError, PortError, PortResult};
use crate::external::External;
use crate::port::{Inlet, Message, MessageKind, Outlet};

/// Runtime map from numbered slots to inlets.
///
/// Slot `k` is bound to the inlet at sequence position `k - 1`, so a slot
/// number is unique across kinds and the table is indexed by slot.
#[derive(Debug, Default, Clone)]
pub struct DispatchTable {
    slots: Vec<Option<MessageKind>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for the inlet at `index`, if it fits within `capacity`.
    pub fn slot_for(index: usize, capacity: usize) -> PortResult<usize> {
        let slot = index + 1;
        if slot > capacity {
            return Err(PortError::ConfigurationOverflow {
                capacity,
                requested: slot,
            });
        }
        Ok(slot)
    }

    /// Bind `slot` of `kind` to its inlet.
    pub fn insert(&mut self, kind: MessageKind, slot: usize) {
        debug_assert!(slot > 0, "dispatch slots are 1-based");
        if self.slots.len() < slot {
            self.slots.resize(slot, None);
        }
        self.slots[slot - 1] = Some(kind);
    }

    /// Inlet index bound to `slot` of `kind`.
    pub fn resolve(&self, kind: MessageKind, slot: usize) -> Option<usize> {
        let index = slot.checked_sub(1)?;
        match self.slots.get(index) {
            Some(Some(bound)) if *bound == kind => Some(index),
            _ => None,
        }
    }

    /// Number of slots in use.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every bound `(kind, slot)` pair, in slot order.
    pub fn entries(&self) -> impl Iterator<Item = (MessageKind, usize)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, kind)| kind.map(|k| (k, i + 1)))
    }
}

/// Result of delivering one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A receiver method ran.
    Received,
    /// The value was written into passive storage.
    Stored,
}

/// Check `message` against `inlets[index]` and hand it to the external.
///
/// Kinds must match exactly; callers coerce beforehand where the host
/// calls for it.
pub fn deliver<E: External>(
    external: &mut E,
    inlets: &[Inlet],
    outlets: &[Outlet],
    index: usize,
    message: Message,
) -> Result<Delivery, DispatchError> {
    let inlet = inlets.get(index).ok_or(DispatchError::UnknownInlet(index))?;

    if let Some(storage) = inlet.passive_storage() {
        return if storage.store(&message) {
            Ok(Delivery::Stored)
        } else {
            Err(DispatchError::KindMismatch {
                expected: inlet.kind(),
                got: message.kind(),
            })
        };
    }

    if inlet.kind() != message.kind() {
        return Err(DispatchError::KindMismatch {
            expected: inlet.kind(),
            got: message.kind(),
        });
    }

    match message {
        Message::Bang => external.bang_received(inlet, outlets),
        Message::Int(value) => external.int_received(inlet, value, outlets),
        Message::Float(value) => external.float_received(inlet, value, outlets),
        Message::Symbol(symbol) => external.symbol_received(inlet, &symbol, outlets),
    }
    Ok(Delivery::Received)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::{Atom, Symbol};
    use crate::error::ExternalResult;
    use crate::port::{PassiveFloat, PassiveStorage};
    use crate::registry::PortRegistry;

    #[derive(Default)]
    struct Probe {
        received: Vec<(usize, Message)>,
    }

    impl External for Probe {
        fn setup(&mut self, _ports: &mut PortRegistry, _args: &[Atom]) -> ExternalResult<()> {
            Ok(())
        }

        fn bang_received(&mut self, inlet: &Inlet, _outlets: &[Outlet]) {
            self.received.push((inlet.index(), Message::Bang));
        }

        fn int_received(&mut self, inlet: &Inlet, value: i64, _outlets: &[Outlet]) {
            self.received.push((inlet.index(), Message::Int(value)));
        }

        fn float_received(&mut self, inlet: &Inlet, value: f64, _outlets: &[Outlet]) {
            self.received.push((inlet.index(), Message::Float(value)));
        }

        fn symbol_received(&mut self, inlet: &Inlet, symbol: &Symbol, _outlets: &[Outlet]) {
            self.received.push((inlet.index(), Message::Symbol(symbol.clone())));
        }
    }

    fn inlets() -> Vec<Inlet> {
        vec![
            Inlet::new(0, "bang".into(), MessageKind::Bang, Some(1), None),
            Inlet::new(1, "f".into(), MessageKind::Float, Some(2), None),
            Inlet::new(
                2,
                "p".into(),
                MessageKind::Float,
                None,
                Some(PassiveStorage::Float(PassiveFloat::new(0.0))),
            ),
        ]
    }

    #[test]
    fn test_slot_table_resolution() {
        let mut table = DispatchTable::new();
        table.insert(MessageKind::Bang, 1);
        table.insert(MessageKind::Float, 3);
        assert_eq!(table.resolve(MessageKind::Bang, 1), Some(0));
        assert_eq!(table.resolve(MessageKind::Float, 3), Some(2));
        assert_eq!(table.resolve(MessageKind::Float, 1), None);
        assert_eq!(table.resolve(MessageKind::Float, 2), None);
        assert_eq!(table.resolve(MessageKind::Bang, 0), None);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.entries().collect::<Vec<_>>(),
            vec![(MessageKind::Bang, 1), (MessageKind::Float, 3)]
        );
    }

    #[test]
    fn test_slot_capacity() {
        assert_eq!(DispatchTable::slot_for(6, 7), Ok(7));
        assert_eq!(
            DispatchTable::slot_for(7, 7),
            Err(PortError::ConfigurationOverflow {
                capacity: 7,
                requested: 8
            })
        );
    }

    #[test]
    fn test_deliver_matching_kind() {
        let mut probe = Probe::default();
        let inlets = inlets();
        assert_eq!(
            deliver(&mut probe, &inlets, &[], 1, Message::Float(0.25)),
            Ok(Delivery::Received)
        );
        assert_eq!(probe.received, vec![(1, Message::Float(0.25))]);
    }

    #[test]
    fn test_deliver_mismatch_drops() {
        let mut probe = Probe::default();
        let inlets = inlets();
        let err = deliver(&mut probe, &inlets, &[], 0, Message::Float(1.0)).unwrap_err();
        assert_eq!(err.to_string(), "Inlet expects bang");
        assert!(probe.received.is_empty());
    }

    #[test]
    fn test_deliver_passive_stores_without_receiver() {
        let mut probe = Probe::default();
        let inlets = inlets();
        assert_eq!(
            deliver(&mut probe, &inlets, &[], 2, Message::Float(0.5)),
            Ok(Delivery::Stored)
        );
        assert!(probe.received.is_empty());
        match inlets[2].passive_storage() {
            Some(PassiveStorage::Float(cell)) => assert_eq!(cell.get(), 0.5),
            other => panic!("unexpected storage {:?}", other),
        }
    }

    #[test]
    fn test_deliver_unknown_inlet() {
        let mut probe = Probe::default();
        assert_eq!(
            deliver(&mut probe, &inlets(), &[], 9, Message::Bang),
            Err(DispatchError::UnknownInlet(9))
        );
    }
}
