//! [`HostBinding`] for Pd: numbered-slot dispatch.
//!
//! Every inlet is created explicitly. Active inlets forward their messages
//! to the owner under a per-slot selector (`ext_floatin_3`), so the class
//! method that runs already knows its slot. Passive inlets write straight
//! into a host cell.

use std::sync::Arc;

use twinlet_core::{
    DispatchStrategy, HostBinding, HostHandle, InletRequest, MessageKind, OutletRequest,
    PassiveStorage, PortError, PortResult,
};

use crate::class::PdClass;
use crate::handle::{PdInlet, PdOutlet, PdPassiveFloat, PdPassiveSymbol};
use crate::sys::t_object;
use crate::trampoline::MAX_SLOTS;

/// Binding of one instance under construction.
pub struct PdBinding {
    class: Arc<PdClass>,
    owner: *mut t_object,
}

impl PdBinding {
    pub(crate) fn new(class: Arc<PdClass>, owner: *mut t_object) -> Self {
        Self { class, owner }
    }

    fn refused(&self, what: &str) -> PortError {
        PortError::HostRefused(format!("{} on '{}'", what, self.class.config().name))
    }

    fn bind_active(&self, kind: MessageKind, slot: Option<usize>) -> PortResult<HostHandle> {
        let slot = slot.ok_or_else(|| {
            PortError::InvalidState(format!("{} inlet without dispatch slot", kind))
        })?;
        if slot > MAX_SLOTS {
            return Err(PortError::ConfigurationOverflow {
                capacity: MAX_SLOTS,
                requested: slot,
            });
        }
        let slot_kind = self.slot_kind(kind);
        let selector = self.class.ensure_slot_method(slot_kind, slot)?;
        // SAFETY: owner is the live object being constructed.
        let raw = unsafe {
            self.class
                .api
                .inlet_new(self.owner, slot_kind.as_str(), &selector)
        };
        if raw.is_null() {
            return Err(self.refused("inlet_new failed"));
        }
        Ok(Box::new(PdInlet::new(Arc::clone(&self.class.api), raw)))
    }
}

impl HostBinding for PdBinding {
    fn strategy(&self) -> DispatchStrategy {
        DispatchStrategy::NumberedSlots
    }

    fn slot_kind(&self, kind: MessageKind) -> MessageKind {
        match kind {
            // Pd has no int message; int inlets take floats.
            MessageKind::Int => MessageKind::Float,
            other => other,
        }
    }

    fn bind_inlet(&self, request: &InletRequest<'_>) -> PortResult<Option<HostHandle>> {
        let api = Arc::clone(&self.class.api);
        let handle: HostHandle = match (request.kind, request.passive) {
            (MessageKind::Signal, _) => {
                self.class.ensure_dsp();
                // SAFETY: owner is the live object being constructed.
                let raw = unsafe { api.inlet_new(self.owner, "signal", "signal") };
                if raw.is_null() {
                    return Err(self.refused("signal inlet_new failed"));
                }
                Box::new(PdInlet::new(api, raw))
            }
            (_, Some(PassiveStorage::Float(storage))) => Box::new(
                PdPassiveFloat::create(api, self.owner, storage.clone())
                    .ok_or_else(|| self.refused("floatinlet_new failed"))?,
            ),
            (_, Some(PassiveStorage::Symbol(storage))) => Box::new(
                PdPassiveSymbol::create(api, self.owner, storage.clone())
                    .ok_or_else(|| self.refused("symbolinlet_new failed"))?,
            ),
            (kind, None) => self.bind_active(kind, request.slot)?,
        };
        Ok(Some(handle))
    }

    fn bind_outlet(&self, request: &OutletRequest<'_>) -> PortResult<Option<HostHandle>> {
        let signal = request.kind.is_signal();
        if signal {
            self.class.ensure_dsp();
        }
        let kind = signal.then_some("signal");
        // SAFETY: owner is the live object being constructed.
        let raw = unsafe { self.class.api.outlet_new(self.owner, kind) };
        if raw.is_null() {
            return Err(self.refused("outlet_new failed"));
        }
        Ok(Some(Box::new(PdOutlet::new(
            Arc::clone(&self.class.api),
            raw,
            signal,
        ))))
    }

    fn post(&self, message: &str) {
        self.class
            .api
            .post(&format!("{}: {}", self.class.name(), message));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use twinlet_core::{
        Atom, Buffer, ClassConfig, External, ExternalError, ExternalResult, Inlet, Message,
        Outlet, PassiveFloat, PortRegistry, Sample, Symbol,
    };

    use crate::mock::{MockPd, Release};

    static MIXER: ClassConfig = ClassConfig::new("mixer_tilde");

    #[derive(Default)]
    struct Mixer {
        balance: f64,
        trim: PassiveFloat,
        seen_trim: f64,
        reports: usize,
        ints: Vec<i64>,
        names: Vec<String>,
    }

    impl External for Mixer {
        fn setup(&mut self, ports: &mut PortRegistry, args: &[Atom]) -> ExternalResult<()> {
            self.balance = args.first().map(Atom::float).unwrap_or(0.5);
            self.trim = PassiveFloat::new(1.0);
            ports.setup_io(2, 1)?;
            ports.add_inlet_float("balance")?;
            ports.add_inlet_float_passive("trim", &self.trim)?;
            ports.add_inlet_bang("report")?;
            ports.add_inlet_int("steps")?;
            ports.add_inlet_symbol("name")?;
            ports.add_outlet("value")?;
            ports.add_outlet("done")?;
            Ok(())
        }

        fn process<S: Sample>(&mut self, buffer: &mut Buffer<'_, S>) {
            let b = S::from_f64(self.balance.clamp(0.0, 1.0));
            let left = buffer.input(0);
            let right = buffer.input(1);
            if let Some(out) = buffer.output(0) {
                for ((o, l), r) in out.iter_mut().zip(left).zip(right) {
                    *o = *l * (S::ONE - b) + *r * b;
                }
            }
        }

        fn bang_received(&mut self, _inlet: &Inlet, outlets: &[Outlet]) {
            self.seen_trim = self.trim.get();
            self.reports += 1;
            outlets[1].send_int(7);
            outlets[1].send_symbol(&Symbol::new("ok"));
            outlets[2].send_bang();
        }

        fn int_received(&mut self, _inlet: &Inlet, value: i64, _outlets: &[Outlet]) {
            self.ints.push(value);
        }

        fn float_received(&mut self, _inlet: &Inlet, value: f64, _outlets: &[Outlet]) {
            self.balance = value;
        }

        fn symbol_received(&mut self, _inlet: &Inlet, symbol: &Symbol, _outlets: &[Outlet]) {
            self.names.push(symbol.to_string());
        }
    }

    fn mixer(pd: &std::sync::Arc<MockPd>) -> *mut crate::sys::t_object {
        let class = pd.register::<Mixer>(&MIXER).unwrap();
        pd.instantiate(&class, &[Atom::Float(0.25)]).unwrap()
    }

    #[test]
    fn test_creates_inlets_in_declaration_order() {
        let pd = MockPd::new();
        let class = pd.register::<Mixer>(&MIXER).unwrap();
        let object = pd.instantiate(&class, &[]).unwrap();

        assert_eq!(
            pd.inlet_kinds(object),
            vec!["signal", "signal", "float", "passive float", "bang", "float", "symbol"]
        );
        assert_eq!(pd.outlet_kinds(object), vec![true, false, false]);
        assert_eq!(
            pd.methods(&class),
            vec![
                "dsp",
                "ext_bangin_5",
                "ext_floatin_3",
                "ext_floatin_6",
                "ext_symbolin_7"
            ]
        );
    }

    #[test]
    fn test_float_reaches_its_slot() {
        let pd = MockPd::new();
        let object = mixer(&pd);
        pd.send_float(object, 2, 0.75);
        let external = unsafe { pd.external::<Mixer>(object) }.unwrap();
        assert_eq!(external.balance, 0.75);
        assert!(external.ints.is_empty());
    }

    #[test]
    fn test_int_inlet_truncates_floats() {
        let pd = MockPd::new();
        let object = mixer(&pd);
        pd.send_float(object, 5, 2.9);
        pd.send_float(object, 5, -1.5);
        let external = unsafe { pd.external::<Mixer>(object) }.unwrap();
        assert_eq!(external.ints, vec![2, -1]);
    }

    #[test]
    fn test_symbol_inlet() {
        let pd = MockPd::new();
        let object = mixer(&pd);
        pd.send_symbol(object, 6, "left");
        let external = unsafe { pd.external::<Mixer>(object) }.unwrap();
        assert_eq!(external.names, vec!["left".to_string()]);
    }

    #[test]
    fn test_wrong_kind_is_rejected_by_inlet() {
        let pd = MockPd::new();
        let object = mixer(&pd);
        pd.send_bang(object, 2);
        let external = unsafe { pd.external::<Mixer>(object) }.unwrap();
        assert_eq!(external.balance, 0.25);
        assert!(pd
            .posts()
            .contains(&"inlet: expected 'float' but got 'bang'".to_string()));
    }

    #[test]
    fn test_passive_value_visible_at_next_dispatch() {
        let pd = MockPd::new();
        let object = mixer(&pd);
        pd.send_float(object, 3, 0.3);
        let external = unsafe { pd.external::<Mixer>(object) }.unwrap();
        assert_eq!(external.balance, 0.25);
        assert_eq!(external.reports, 0);
        assert!(pd.messages_from(object).is_empty());

        pd.send_bang(object, 4);
        let external = unsafe { pd.external::<Mixer>(object) }.unwrap();
        assert!((external.seen_trim - 0.3).abs() < 1e-6);
        assert_eq!(external.reports, 1);
    }

    #[test]
    fn test_feedback_into_own_inlet_is_dropped() {
        let pd = MockPd::new();
        let object = mixer(&pd);
        pd.connect(object, 2, object, 4);

        pd.send_bang(object, 4);
        let external = unsafe { pd.external::<Mixer>(object) }.unwrap();
        assert_eq!(external.reports, 1);
        assert_eq!(pd.messages_from(object).len(), 3);
        assert!(pd
            .posts()
            .contains(&"mixer~: recursive message dropped".to_string()));

        // The object accepts messages again once the outer call returned.
        pd.send_bang(object, 4);
        let external = unsafe { pd.external::<Mixer>(object) }.unwrap();
        assert_eq!(external.reports, 2);
    }

    #[test]
    fn test_cord_between_objects_delivers() {
        let pd = MockPd::new();
        let source = mixer(&pd);
        let target = mixer(&pd);
        pd.connect(source, 1, target, 2);

        pd.send_bang(source, 4);
        let external = unsafe { pd.external::<Mixer>(target) }.unwrap();
        assert_eq!(external.balance, 7.0);
        assert!(!pd.posts().iter().any(|p| p.contains("recursive")));
    }

    #[test]
    fn test_outlet_messages() {
        let pd = MockPd::new();
        let object = mixer(&pd);
        pd.send_bang(object, 4);
        assert_eq!(
            pd.messages_from(object),
            vec![
                (1, Message::Float(7.0)),
                (1, Message::Symbol(Symbol::new("ok"))),
                (2, Message::Bang),
            ]
        );
    }

    #[test]
    fn test_perform_renders_and_advances_chain() {
        let pd = MockPd::new();
        let object = mixer(&pd);
        pd.send_float(object, 2, 0.5);

        let mut left = vec![1.0f32; 64];
        let mut right = vec![0.5f32; 64];
        let mut out = vec![0.0f32; 64];
        unsafe {
            pd.dsp(
                object,
                &[left.as_mut_ptr(), right.as_mut_ptr(), out.as_mut_ptr()],
                64,
            )
        };
        assert_eq!(pd.chain_len(), 1);
        assert!(pd.tick());
        assert!(out.iter().all(|s| (*s - 0.75).abs() < 1e-6));
    }

    #[test]
    fn test_in_place_signal_buffers() {
        let pd = MockPd::new();
        let object = mixer(&pd);
        pd.send_float(object, 2, 1.0);

        let mut shared = vec![0.25f32; 16];
        let mut right = vec![0.5f32; 16];
        let shared_ptr = shared.as_mut_ptr();
        unsafe { pd.dsp(object, &[shared_ptr, right.as_mut_ptr(), shared_ptr], 16) };
        assert!(pd.tick());
        assert!(shared.iter().all(|s| (*s - 0.5).abs() < 1e-6));
    }

    static EXITS: AtomicUsize = AtomicUsize::new(0);
    static TRACKED: ClassConfig = ClassConfig::new("tracked");

    #[derive(Default)]
    struct Tracked;

    impl External for Tracked {
        fn setup(&mut self, ports: &mut PortRegistry, _args: &[Atom]) -> ExternalResult<()> {
            ports.add_inlet_bang("a")?;
            ports.add_inlet_float("b")?;
            ports.add_outlet("out")?;
            Ok(())
        }

        fn exit(&mut self) {
            EXITS.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_destroy_releases_ports_then_exits() {
        let pd = MockPd::new();
        let class = pd.register::<Tracked>(&TRACKED).unwrap();
        let object = pd.instantiate(&class, &[]).unwrap();
        let before = EXITS.load(Ordering::SeqCst);

        pd.destroy(object);
        assert_eq!(
            pd.releases(),
            vec![Release::Inlet(0), Release::Inlet(1), Release::Outlet(0)]
        );
        assert_eq!(EXITS.load(Ordering::SeqCst), before + 1);
        assert_eq!(pd.live_objects(), 0);
    }

    static WIDE: ClassConfig = ClassConfig::new("wide").with_max_control_inlets(32);

    #[derive(Default)]
    struct Wide;

    impl External for Wide {
        fn setup(&mut self, ports: &mut PortRegistry, _args: &[Atom]) -> ExternalResult<()> {
            for i in 0..=crate::MAX_SLOTS {
                ports.add_inlet_float(&format!("f{}", i))?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_slot_overflow_fails_creation() {
        let pd = MockPd::new();
        let class = pd.register::<Wide>(&WIDE).unwrap();
        assert!(pd.instantiate(&class, &[]).is_none());
        assert_eq!(pd.live_objects(), 0);
        assert_eq!(pd.releases().len(), crate::MAX_SLOTS);
        assert!(pd
            .posts()
            .iter()
            .any(|p| p.starts_with("wide: ") && p.contains("Configuration overflow")));
    }

    static PICKY: ClassConfig = ClassConfig::new("picky");

    #[derive(Default)]
    struct Picky;

    impl External for Picky {
        fn setup(&mut self, _ports: &mut PortRegistry, args: &[Atom]) -> ExternalResult<()> {
            if args.is_empty() {
                return Err(ExternalError::Setup("needs an argument".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_failed_setup_posts_reason() {
        let pd = MockPd::new();
        let class = pd.register::<Picky>(&PICKY).unwrap();
        assert!(pd.instantiate(&class, &[]).is_none());
        assert!(pd.instantiate(&class, &[Atom::Float(1.0)]).is_some());
        assert_eq!(pd.posts().len(), 1);
        assert!(pd.posts()[0].contains("needs an argument"));
    }
}
