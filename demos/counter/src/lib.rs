//! counter - Example control external demonstrating the Twinlet framework.
//!
//! Counts between two bounds. Each bang outputs the current count and
//! advances it by the step; stepping past a bound wraps to the other one and
//! bangs the right outlet.
//!
//! Creation arguments: `counter [bound] [bound] [step]`. The bounds may be
//! given in either order. With a single bound the counter never wraps.

use twinlet::prelude::*;

// =============================================================================
// Configuration
// =============================================================================

pub static CONFIG: ClassConfig =
    ClassConfig::new("counter").with_description("Wrapping counter driven by bangs");

// =============================================================================
// External
// =============================================================================

pub struct Counter {
    count: i64,
    step: f64,
    down: i64,
    up: i64,
}

impl Default for Counter {
    fn default() -> Self {
        Self {
            count: 0,
            step: 1.0,
            down: 0,
            up: 0,
        }
    }
}

impl Counter {
    pub fn count(&self) -> i64 {
        self.count
    }

    pub fn bounds(&self) -> (i64, i64) {
        (self.down, self.up)
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Advance once. Returns the value to output and whether it wrapped.
    fn advance(&mut self) -> (i64, bool) {
        let current = self.count;
        self.count = (self.count as f64 + self.step) as i64;

        let mut wrapped = false;
        if self.down != self.up {
            if self.step > 0.0 && self.count > self.up {
                self.count = self.down;
                wrapped = true;
            } else if self.count < self.down {
                self.count = self.up;
                wrapped = true;
            }
        }
        (current, wrapped)
    }
}

impl External for Counter {
    fn setup(&mut self, ports: &mut PortRegistry, args: &[Atom]) -> ExternalResult<()> {
        let first = args.first().map(Atom::float).unwrap_or(0.0);
        let second = args.get(1).map(Atom::float).unwrap_or(first);
        if let Some(step) = args.get(2) {
            self.step = step.float();
        }

        self.down = first.min(second) as i64;
        self.up = first.max(second) as i64;
        self.count = self.down;

        ports.add_inlet_bang("bang")?;
        ports.add_inlet_float("step")?;
        ports.add_outlet("count")?;
        ports.add_outlet("wrap")?;
        Ok(())
    }

    fn bang_received(&mut self, _inlet: &Inlet, outlets: &[Outlet]) {
        let (current, wrapped) = self.advance();
        // Right to left
        if wrapped {
            if let Some(wrap) = outlets.get(1) {
                wrap.send_bang();
            }
        }
        if let Some(count) = outlets.first() {
            count.send_float(current as f64);
        }
    }

    fn float_received(&mut self, _inlet: &Inlet, value: f64, _outlets: &[Outlet]) {
        self.step = value;
    }
}

// =============================================================================
// Exports
// =============================================================================

twinlet::export_pd!(CONFIG, Counter, counter_setup);
twinlet::export_max!(CONFIG, Counter);

#[cfg(test)]
mod tests {
    use super::*;
    use twinlet::max::mock::MockMax;
    use twinlet::pd::mock::MockPd;

    fn expected_cycle() -> Vec<(usize, Message)> {
        let mut expected: Vec<(usize, Message)> =
            (0..10).map(|n| (0, Message::Float(n as f64))).collect();
        expected.push((1, Message::Bang));
        expected.push((0, Message::Float(10.0)));
        expected.push((0, Message::Float(0.0)));
        expected
    }

    #[test]
    fn test_arguments() {
        let pd = MockPd::new();
        let class = pd.register::<Counter>(&CONFIG).unwrap();

        let object = pd
            .instantiate(&class, &[Atom::Float(10.0), Atom::Float(2.7)])
            .unwrap();
        let counter = unsafe { pd.external::<Counter>(object) }.unwrap();
        assert_eq!(counter.bounds(), (2, 10));
        assert_eq!(counter.count(), 2);
        assert_eq!(counter.step(), 1.0);

        let object = pd
            .instantiate(&class, &[Atom::Float(4.0), Atom::Float(8.0), Atom::Float(2.0)])
            .unwrap();
        let counter = unsafe { pd.external::<Counter>(object) }.unwrap();
        assert_eq!(counter.bounds(), (4, 8));
        assert_eq!(counter.step(), 2.0);

        let object = pd.instantiate(&class, &[Atom::Float(5.0)]).unwrap();
        let counter = unsafe { pd.external::<Counter>(object) }.unwrap();
        assert_eq!(counter.bounds(), (5, 5));
    }

    #[test]
    fn test_extra_arguments_keep_step() {
        let pd = MockPd::new();
        let class = pd.register::<Counter>(&CONFIG).unwrap();
        let args = [
            Atom::Float(0.0),
            Atom::Float(10.0),
            Atom::Float(2.0),
            Atom::Float(9.0),
        ];
        let object = pd.instantiate(&class, &args).unwrap();
        let counter = unsafe { pd.external::<Counter>(object) }.unwrap();
        assert_eq!(counter.bounds(), (0, 10));
        assert_eq!(counter.step(), 2.0);
    }

    #[test]
    fn test_wraps_under_pd() {
        let pd = MockPd::new();
        let class = pd.register::<Counter>(&CONFIG).unwrap();
        let object = pd
            .instantiate(&class, &[Atom::Float(0.0), Atom::Float(10.0)])
            .unwrap();

        for _ in 0..12 {
            pd.send_bang(object, 0);
        }
        assert_eq!(pd.messages_from(object), expected_cycle());
        pd.destroy(object);
    }

    #[test]
    fn test_wraps_under_max() {
        let max = MockMax::new();
        let class = max.register::<Counter>(&CONFIG).unwrap();
        let object = max
            .instantiate(&class, &[Atom::Float(0.0), Atom::Float(10.0)])
            .unwrap();
        assert_eq!(max.proxy_ids(object), vec![1]);

        for _ in 0..12 {
            max.send_bang(object, 0);
        }
        assert_eq!(max.messages_from(object), expected_cycle());
        max.destroy(object);
    }

    #[test]
    fn test_step_inlet() {
        let pd = MockPd::new();
        let class = pd.register::<Counter>(&CONFIG).unwrap();
        let object = pd
            .instantiate(&class, &[Atom::Float(0.0), Atom::Float(10.0)])
            .unwrap();

        pd.send_float(object, 1, 4.0);
        for _ in 0..4 {
            pd.send_bang(object, 0);
        }
        assert_eq!(
            pd.messages_from(object),
            vec![
                (0, Message::Float(0.0)),
                (0, Message::Float(4.0)),
                (1, Message::Bang),
                (0, Message::Float(8.0)),
                (0, Message::Float(0.0)),
            ]
        );
    }

    #[test]
    fn test_counts_down_and_wraps_to_upper_bound() {
        let max = MockMax::new();
        let class = max.register::<Counter>(&CONFIG).unwrap();
        let object = max
            .instantiate(&class, &[Atom::Float(0.0), Atom::Float(3.0), Atom::Float(-1.0)])
            .unwrap();

        for _ in 0..3 {
            max.send_bang(object, 0);
        }
        assert_eq!(
            max.messages_from(object),
            vec![
                (1, Message::Bang),
                (0, Message::Float(0.0)),
                (0, Message::Float(3.0)),
                (0, Message::Float(2.0)),
            ]
        );
    }

    #[test]
    fn test_single_bound_never_wraps() {
        let mut counter = Counter {
            count: 5,
            step: 1.0,
            down: 5,
            up: 5,
        };
        assert_eq!(counter.advance(), (5, false));
        assert_eq!(counter.advance(), (6, false));
    }
}
