//! [`HostBinding`] for Max: proxy-index dispatch.
//!
//! Max inlets and outlets are prepended to the box, so every host port is
//! created during layout, right to left. Inlet 0 and the signal inlets
//! belong to the object itself; every other inlet is a proxy whose id is
//! its index.

use std::ffi::c_long;
use std::ptr::addr_of_mut;
use std::sync::Arc;

use twinlet_core::{
    DispatchStrategy, HostBinding, HostHandle, InletRequest, LayoutPorts, OutletRequest,
    PortError, PortResult,
};

use crate::class::MaxClass;
use crate::handle::{MaxOutlet, MaxProxy};
use crate::object::MaxObject;
use crate::sys::{t_object, t_pxobject};

/// Binding of one instance under construction.
pub struct MaxBinding {
    class: Arc<MaxClass>,
    owner: *mut t_object,
}

impl MaxBinding {
    pub(crate) fn new(class: Arc<MaxClass>, owner: *mut t_object) -> Self {
        Self { class, owner }
    }

    fn refused(&self, what: &str) -> PortError {
        PortError::HostRefused(format!("{} on '{}'", what, self.class.config().name))
    }
}

/// Index of the first inlet that needs a proxy.
pub(crate) fn first_proxy_index(in_channels: usize) -> usize {
    in_channels.max(1)
}

impl HostBinding for MaxBinding {
    fn strategy(&self) -> DispatchStrategy {
        DispatchStrategy::ProxyIndex
    }

    fn bind_inlet(&self, _request: &InletRequest<'_>) -> PortResult<Option<HostHandle>> {
        Ok(None)
    }

    fn bind_outlet(&self, _request: &OutletRequest<'_>) -> PortResult<Option<HostHandle>> {
        Ok(None)
    }

    fn layout(&self, ports: &mut LayoutPorts<'_>) -> PortResult<()> {
        let api = &self.class.api;
        let record = self.owner as *mut MaxObject;

        for index in (first_proxy_index(ports.in_channels())..ports.inlets().len()).rev() {
            // SAFETY: owner is the live object being constructed and
            // proxy_inlet lives as long as it.
            let raw = unsafe {
                api.proxy_new(
                    self.owner,
                    index as c_long,
                    addr_of_mut!((*record).proxy_inlet),
                )
            };
            if raw.is_null() {
                return Err(self.refused("proxy_new failed"));
            }
            ports.attach_inlet(index, Box::new(MaxProxy::new(Arc::clone(api), raw)))?;
        }

        if ports.has_signal() {
            // SAFETY: MaxObject starts with a t_pxobject header.
            unsafe {
                api.dsp_setup(self.owner as *mut t_pxobject, ports.in_channels() as c_long);
                (*record).dsp = true;
            }
        }

        for index in (0..ports.outlets().len()).rev() {
            let signal = ports.outlets()[index].is_signal();
            // SAFETY: owner is the live object being constructed.
            let raw = unsafe { api.outlet_new(self.owner, signal.then_some("signal")) };
            if raw.is_null() {
                return Err(self.refused("outlet_new failed"));
            }
            ports.attach_outlet(index, Box::new(MaxOutlet::new(Arc::clone(api), raw, signal)))?;
        }

        log::debug!(
            "Laid out Max object: {} proxies, {} outlets",
            ports
                .inlets()
                .len()
                .saturating_sub(first_proxy_index(ports.in_channels())),
            ports.outlets().len()
        );
        Ok(())
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

    use crate::mock::{MockMax, Release};
    use crate::sys::t_object;

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

    fn mixer(max: &std::sync::Arc<MockMax>) -> *mut t_object {
        let class = max.register::<Mixer>(&MIXER).unwrap();
        max.instantiate(&class, &[Atom::Float(0.25)]).unwrap()
    }

    #[test]
    fn test_layout_right_to_left() {
        let max = MockMax::new();
        let class = max.register::<Mixer>(&MIXER).unwrap();
        let object = max.instantiate(&class, &[]).unwrap();

        assert!(max.class_ready(&class));
        assert_eq!(max.signal_inlets(object), 2);
        assert!(max.dsp_active(object));
        assert_eq!(max.proxy_ids(object), vec![2, 3, 4, 5, 6]);
        assert_eq!(max.outlet_kinds(object), vec![true, false, false]);
    }

    #[test]
    fn test_proxy_index_routes_messages() {
        let max = MockMax::new();
        let object = mixer(&max);
        max.send_float(object, 2, 0.9);
        max.send_int(object, 5, 3);
        max.send_symbol(object, 6, "right");

        let external = unsafe { max.external::<Mixer>(object) }.unwrap();
        assert_eq!(external.balance, 0.9);
        assert_eq!(external.ints, vec![3]);
        assert_eq!(external.names, vec!["right".to_string()]);
    }

    #[test]
    fn test_kind_mismatch_is_posted() {
        let max = MockMax::new();
        let object = mixer(&max);
        max.send_float(object, 5, 3.5);

        let external = unsafe { max.external::<Mixer>(object) }.unwrap();
        assert!(external.ints.is_empty());
        assert_eq!(max.posts(), vec!["mixer~: Inlet expects int".to_string()]);
    }

    #[test]
    fn test_passive_inlet_stores_without_receiver() {
        let max = MockMax::new();
        let object = mixer(&max);
        max.send_float(object, 3, 0.4);

        let external = unsafe { max.external::<Mixer>(object) }.unwrap();
        assert_eq!(external.balance, 0.25);
        assert_eq!(external.trim.get(), 0.4);

        max.send_int(object, 3, 2);
        let external = unsafe { max.external::<Mixer>(object) }.unwrap();
        assert_eq!(external.trim.get(), 2.0);
    }

    #[test]
    fn test_outlet_messages() {
        let max = MockMax::new();
        let object = mixer(&max);
        max.send_bang(object, 4);
        assert_eq!(
            max.messages_from(object),
            vec![
                (1, Message::Int(7)),
                (1, Message::Symbol(Symbol::new("ok"))),
                (2, Message::Bang),
            ]
        );
    }

    #[test]
    fn test_feedback_into_own_inlet_is_dropped() {
        let max = MockMax::new();
        let object = mixer(&max);
        max.connect(object, 2, object, 4);

        max.send_bang(object, 4);
        let external = unsafe { max.external::<Mixer>(object) }.unwrap();
        assert_eq!(external.reports, 1);
        assert_eq!(max.messages_from(object).len(), 3);
        assert!(max
            .posts()
            .contains(&"mixer~: recursive message dropped".to_string()));

        max.send_bang(object, 4);
        let external = unsafe { max.external::<Mixer>(object) }.unwrap();
        assert_eq!(external.reports, 2);
    }

    #[test]
    fn test_cord_between_objects_delivers() {
        let max = MockMax::new();
        let source = mixer(&max);
        let target = mixer(&max);
        max.connect(source, 1, target, 5);

        max.send_bang(source, 4);
        let external = unsafe { max.external::<Mixer>(target) }.unwrap();
        assert_eq!(external.ints, vec![7]);
        assert!(!max.posts().iter().any(|p| p.contains("recursive")));
    }

    #[test]
    fn test_perform64_renders() {
        let max = MockMax::new();
        let object = mixer(&max);
        max.send_float(object, 2, 0.5);
        max.dsp(object, 64);

        let mut left = vec![1.0f64; 64];
        let mut right = vec![0.5f64; 64];
        let mut out = vec![0.0f64; 64];
        let rendered = unsafe {
            max.perform(
                object,
                &[left.as_mut_ptr(), right.as_mut_ptr()],
                &[out.as_mut_ptr()],
                64,
            )
        };
        assert!(rendered);
        assert!(out.iter().all(|s| (*s - 0.75).abs() < 1e-12));
    }

    #[test]
    fn test_missing_signal_channel_reads_silence() {
        let max = MockMax::new();
        let object = mixer(&max);
        max.send_float(object, 2, 1.0);
        max.dsp(object, 8);

        let mut left = vec![1.0f64; 8];
        let mut out = vec![9.0f64; 8];
        assert!(unsafe { max.perform(object, &[left.as_mut_ptr()], &[out.as_mut_ptr()], 8) });
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_destroy_frees_dsp_then_ports() {
        let max = MockMax::new();
        let object = mixer(&max);
        max.destroy(object);
        assert_eq!(
            max.releases(),
            vec![
                Release::Dsp,
                Release::Proxy(2),
                Release::Proxy(3),
                Release::Proxy(4),
                Release::Proxy(5),
                Release::Proxy(6),
                Release::Outlet(0),
                Release::Outlet(1),
                Release::Outlet(2),
            ]
        );
        assert_eq!(max.live_objects(), 0);
    }

    static EXITS: AtomicUsize = AtomicUsize::new(0);
    static TOGGLE: ClassConfig = ClassConfig::new("toggle");

    #[derive(Default)]
    struct Toggle {
        on: bool,
        step: f64,
    }

    impl External for Toggle {
        fn setup(&mut self, ports: &mut PortRegistry, _args: &[Atom]) -> ExternalResult<()> {
            ports.add_inlet_bang("flip")?;
            ports.add_inlet_float("step")?;
            ports.add_outlet("state")?;
            Ok(())
        }

        fn exit(&mut self) {
            EXITS.fetch_add(1, Ordering::SeqCst);
        }

        fn bang_received(&mut self, inlet: &Inlet, outlets: &[Outlet]) {
            assert_eq!(inlet.index(), 0);
            self.on = !self.on;
            outlets[0].send_int(self.on as i64);
        }

        fn float_received(&mut self, _inlet: &Inlet, value: f64, _outlets: &[Outlet]) {
            self.step = value;
        }
    }

    #[test]
    fn test_control_object_uses_main_inlet() {
        let max = MockMax::new();
        let class = max.register::<Toggle>(&TOGGLE).unwrap();
        let object = max.instantiate(&class, &[]).unwrap();

        assert_eq!(max.signal_inlets(object), 0);
        assert!(!max.dsp_active(object));
        assert_eq!(max.proxy_ids(object), vec![1]);

        max.send_bang(object, 0);
        max.send_float(object, 1, 0.5);
        assert_eq!(max.messages_from(object), vec![(0, Message::Int(1))]);
        let external = unsafe { max.external::<Toggle>(object) }.unwrap();
        assert_eq!(external.step, 0.5);

        let before = EXITS.load(Ordering::SeqCst);
        max.destroy(object);
        assert_eq!(
            max.releases(),
            vec![Release::Proxy(1), Release::Outlet(0)]
        );
        assert_eq!(EXITS.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn test_unknown_inlet_is_rejected_by_host() {
        let max = MockMax::new();
        let class = max.register::<Toggle>(&TOGGLE).unwrap();
        let object = max.instantiate(&class, &[]).unwrap();
        max.send_bang(object, 4);
        assert_eq!(max.posts(), vec!["inlet 4 does not exist".to_string()]);
    }

    static PICKY: ClassConfig = ClassConfig::new("picky");

    #[derive(Default)]
    struct Picky;

    impl External for Picky {
        fn setup(&mut self, ports: &mut PortRegistry, args: &[Atom]) -> ExternalResult<()> {
            ports.add_inlet_bang("go")?;
            if args.is_empty() {
                return Err(ExternalError::Setup("needs an argument".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_failed_setup_frees_object() {
        let max = MockMax::new();
        let class = max.register::<Picky>(&PICKY).unwrap();
        assert!(max.instantiate(&class, &[]).is_none());
        assert_eq!(max.live_objects(), 0);
        assert!(max.posts()[0].starts_with("picky: "));
        assert!(max.posts()[0].contains("needs an argument"));
    }
}
