//! balance~ - Example signal external demonstrating the Twinlet framework.
//!
//! Crossfades linearly between two signals:
//! `out = left * (1 - balance) + right * balance`.
//!
//! This external shows how to:
//! 1. Declare signal I/O with `setup_io`
//! 2. Add an active float inlet after the signal ports
//! 3. Read a creation argument
//! 4. Write one generic `process` that renders f32 under Pd and f64 under Max

use twinlet::prelude::*;

// =============================================================================
// Configuration
// =============================================================================

/// Registered as `balance~` on both hosts.
pub static CONFIG: ClassConfig = ClassConfig::new("balance_tilde")
    .with_description("Linear crossfade between two signals");

// =============================================================================
// External
// =============================================================================

#[derive(Default)]
pub struct Balance {
    balance: f64,
}

impl Balance {
    /// Current crossfade position, clamped to `0.0..=1.0` when rendering.
    pub fn balance(&self) -> f64 {
        self.balance
    }
}

impl External for Balance {
    fn setup(&mut self, ports: &mut PortRegistry, args: &[Atom]) -> ExternalResult<()> {
        if let [initial] = args {
            self.balance = initial.float();
        }
        ports.setup_io(2, 1)?;
        ports.add_inlet_float("balance")?;
        Ok(())
    }

    fn float_received(&mut self, _inlet: &Inlet, value: f64, _outlets: &[Outlet]) {
        self.balance = value;
    }

    fn process<S: Sample>(&mut self, buffer: &mut Buffer<'_, S>) {
        let b = S::from_f64(self.balance.clamp(0.0, 1.0));
        let a = S::ONE - b;
        let (left, right) = (buffer.input(0), buffer.input(1));
        if let Some(out) = buffer.output(0) {
            for (i, o) in out.iter_mut().enumerate() {
                let l = left.get(i).copied().unwrap_or(S::ZERO);
                let r = right.get(i).copied().unwrap_or(S::ZERO);
                *o = l * a + r * b;
            }
        }
    }
}

// =============================================================================
// Exports
// =============================================================================

twinlet::export_pd!(CONFIG, Balance, balance_tilde_setup);
twinlet::export_max!(CONFIG, Balance);

#[cfg(test)]
mod tests {
    use super::*;
    use twinlet::max::mock::MockMax;
    use twinlet::pd::mock::MockPd;

    #[test]
    fn test_creation_argument() {
        let pd = MockPd::new();
        let class = pd.register::<Balance>(&CONFIG).unwrap();
        let object = pd.instantiate(&class, &[Atom::Float(0.6)]).unwrap();
        let external = unsafe { pd.external::<Balance>(object) }.unwrap();
        assert_eq!(external.balance(), 0.6);

        // Only a single argument is read.
        let other = pd
            .instantiate(&class, &[Atom::Float(0.6), Atom::Float(0.2)])
            .unwrap();
        let external = unsafe { pd.external::<Balance>(other) }.unwrap();
        assert_eq!(external.balance(), 0.0);
    }

    #[test]
    fn test_crossfade_under_pd() {
        let pd = MockPd::new();
        let class = pd.register::<Balance>(&CONFIG).unwrap();
        let object = pd.instantiate(&class, &[]).unwrap();
        assert_eq!(pd.inlet_kinds(object), vec!["signal", "signal", "float"]);

        pd.send_float(object, 2, 0.25);
        let external = unsafe { pd.external::<Balance>(object) }.unwrap();
        assert_eq!(external.balance(), 0.25);

        let mut left = vec![1.0f32; 4];
        let mut right = vec![0.0f32; 4];
        let mut out = vec![0.0f32; 4];
        unsafe {
            pd.dsp(
                object,
                &[left.as_mut_ptr(), right.as_mut_ptr(), out.as_mut_ptr()],
                4,
            )
        };
        assert!(pd.tick());
        assert_eq!(out, vec![0.75f32; 4]);

        pd.destroy(object);
        assert_eq!(pd.live_objects(), 0);
    }

    #[test]
    fn test_crossfade_under_max() {
        let max = MockMax::new();
        let class = max.register::<Balance>(&CONFIG).unwrap();
        let object = max.instantiate(&class, &[]).unwrap();
        assert_eq!(max.signal_inlets(object), 2);
        assert_eq!(max.proxy_ids(object), vec![2]);

        max.send_float(object, 2, 0.25);
        max.dsp(object, 4);

        let mut left = vec![1.0f64; 4];
        let mut right = vec![0.0f64; 4];
        let mut out = vec![0.0f64; 4];
        let rendered = unsafe {
            max.perform(
                object,
                &[left.as_mut_ptr(), right.as_mut_ptr()],
                &[out.as_mut_ptr()],
                4,
            )
        };
        assert!(rendered);
        assert_eq!(out, vec![0.75f64; 4]);

        max.destroy(object);
        assert_eq!(max.live_objects(), 0);
    }

    #[test]
    fn test_balance_is_clamped() {
        let mut balance = Balance { balance: 3.0 };
        let left = [1.0f32; 2];
        let right = [0.5f32; 2];
        let mut out = [0.0f32; 2];
        let mut buffer = Buffer::new([&left[..], &right[..]], [&mut out[..]], 2);
        balance.process(&mut buffer);
        drop(buffer);
        assert_eq!(out, [0.5; 2]);
    }

    #[test]
    fn test_int_on_balance_inlet_is_rejected_by_max() {
        let max = MockMax::new();
        let class = max.register::<Balance>(&CONFIG).unwrap();
        let object = max.instantiate(&class, &[]).unwrap();
        max.send_int(object, 2, 1);
        let external = unsafe { max.external::<Balance>(object) }.unwrap();
        assert_eq!(external.balance(), 0.0);
        assert!(max
            .posts()
            .iter()
            .any(|p| p == "balance~: Inlet expects float"));
    }
}
