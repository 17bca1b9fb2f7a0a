//! Type-erased external instances.
//!
//! Host crates store a `Box<dyn ObjectInstance>` in their object record and
//! drive it from their raw entry points. [`ExternalInstance`] is the only
//! implementation: it owns the external, its ports and its render storage,
//! and walks the lifecycle from construction to teardown.

use std::any::Any;

use crate::atom::Atom;
use crate::binding::HostBinding;
use crate::config::ClassConfig;
use crate::dispatch::{deliver, Delivery};
use crate::error::{DispatchError, ExternalResult};
use crate::external::External;
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::port::{Message, MessageKind};
use crate::registry::PortRegistry;
use crate::sample::SampleFormat;
use crate::signal::{PerformWord, SignalStorage};
use crate::types::DEFAULT_BLOCK_SIZE;

/// Host-facing view of one constructed external.
///
/// Dispatch errors have already been logged and posted to the host console
/// when they are returned; callers may ignore them.
pub trait ObjectInstance {
    fn state(&self) -> LifecycleState;

    fn ports(&self) -> &PortRegistry;

    /// Deliver an event that arrived on numbered slot `slot` of `kind`.
    fn dispatch_slot(
        &mut self,
        kind: MessageKind,
        slot: usize,
        message: Message,
    ) -> Result<Delivery, DispatchError>;

    /// Deliver an event that arrived on the inlet the host reports as `index`.
    fn dispatch_proxy(&mut self, index: usize, message: Message) -> Result<Delivery, DispatchError>;

    /// Allocate render storage. Called from the host's DSP setup.
    fn prepare_signal(&mut self, format: SampleFormat, max_block: usize);

    /// Render one block from pointer arrays.
    ///
    /// # Safety
    ///
    /// Non-null pointers must be valid for `num_samples` samples.
    unsafe fn render_f32(&mut self, inputs: &[*const f32], outputs: &[*mut f32], num_samples: usize);

    /// # Safety
    ///
    /// Non-null pointers must be valid for `num_samples` samples.
    unsafe fn render_f64(&mut self, inputs: &[*const f64], outputs: &[*mut f64], num_samples: usize);

    /// Render one block from a packed `[in.., out.., n]` list.
    ///
    /// # Safety
    ///
    /// Buffer words must be valid `f32` pointers for `n` samples.
    unsafe fn render_packed_f32(&mut self, words: &[PerformWord]);

    /// Release every port, then run the external's `exit`. Idempotent.
    fn teardown(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

enum SignalState {
    Unprepared,
    Float32(SignalStorage<f32>),
    Float64(SignalStorage<f64>),
}

/// An external together with its ports and lifecycle.
pub struct ExternalInstance<E: External> {
    external: E,
    ports: PortRegistry,
    lifecycle: Lifecycle,
    signal: SignalState,
}

impl<E: External> ExternalInstance<E> {
    /// Run `setup` and layout, leaving the instance active.
    ///
    /// On error every port declared so far is released again.
    pub fn construct(
        binding: Box<dyn HostBinding>,
        config: &ClassConfig,
        args: &[Atom],
    ) -> ExternalResult<Self> {
        let mut instance = Self {
            external: E::default(),
            ports: PortRegistry::new(binding, config),
            lifecycle: Lifecycle::new(),
            signal: SignalState::Unprepared,
        };

        instance.external.setup(&mut instance.ports, args)?;
        instance.lifecycle.advance(LifecycleState::PortsDeclared)?;
        instance.ports.layout()?;
        instance.lifecycle.advance(LifecycleState::LaidOut)?;
        instance.lifecycle.advance(LifecycleState::Active)?;

        log::debug!(
            "Constructed '{}' with {} inlets, {} outlets",
            config.name,
            instance.ports.inlets().len(),
            instance.ports.outlets().len()
        );
        Ok(instance)
    }

    /// [`construct`](Self::construct), boxed for a host object record.
    pub fn boxed(
        binding: Box<dyn HostBinding>,
        config: &ClassConfig,
        args: &[Atom],
    ) -> ExternalResult<Box<dyn ObjectInstance>> {
        Ok(Box::new(Self::construct(binding, config, args)?))
    }

    pub fn external(&self) -> &E {
        &self.external
    }

    pub fn external_mut(&mut self) -> &mut E {
        &mut self.external
    }

    fn ensure_active(&self) -> Result<(), DispatchError> {
        if self.lifecycle.is_active() {
            Ok(())
        } else {
            Err(DispatchError::NotActive(self.lifecycle.state()))
        }
    }

    fn route_slot(
        &mut self,
        kind: MessageKind,
        slot: usize,
        message: Message,
    ) -> Result<Delivery, DispatchError> {
        self.ensure_active()?;
        let index = self
            .ports
            .dispatch_table()
            .resolve(kind, slot)
            .ok_or(DispatchError::UnknownSlot { kind, slot })?;
        let inlet = self
            .ports
            .inlet(index)
            .ok_or(DispatchError::UnknownInlet(index))?;
        if inlet.is_passive() {
            return Err(DispatchError::PassiveInlet(index));
        }
        // Slots carry the host's message kind; convert to the inlet's.
        let message = match message.clone().coerce_to(inlet.kind()) {
            Some(converted) => converted,
            None => message,
        };

        self.ports.sync_passive();
        deliver(
            &mut self.external,
            self.ports.inlets(),
            self.ports.outlets(),
            index,
            message,
        )
    }

    fn route_proxy(&mut self, index: usize, message: Message) -> Result<Delivery, DispatchError> {
        self.ensure_active()?;
        self.ports.sync_passive();
        deliver(
            &mut self.external,
            self.ports.inlets(),
            self.ports.outlets(),
            index,
            message,
        )
    }

    fn report(&self, result: Result<Delivery, DispatchError>) -> Result<Delivery, DispatchError> {
        if let Err(error) = &result {
            log::warn!("Dropped event: {}", error);
            self.ports.post(&error.to_string());
        }
        result
    }

    fn ensure_storage(&mut self, format: SampleFormat, num_samples: usize) {
        let prepared = matches!(
            (&self.signal, format),
            (SignalState::Float32(_), SampleFormat::Float32)
                | (SignalState::Float64(_), SampleFormat::Float64)
        );
        if !prepared {
            log::warn!("Render before DSP setup, preparing {:?} storage", format);
            self.prepare_signal(format, num_samples.max(DEFAULT_BLOCK_SIZE));
        }
    }
}

impl<E: External> ObjectInstance for ExternalInstance<E> {
    fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    fn ports(&self) -> &PortRegistry {
        &self.ports
    }

    fn dispatch_slot(
        &mut self,
        kind: MessageKind,
        slot: usize,
        message: Message,
    ) -> Result<Delivery, DispatchError> {
        let result = self.route_slot(kind, slot, message);
        self.report(result)
    }

    fn dispatch_proxy(&mut self, index: usize, message: Message) -> Result<Delivery, DispatchError> {
        let result = self.route_proxy(index, message);
        self.report(result)
    }

    fn prepare_signal(&mut self, format: SampleFormat, max_block: usize) {
        let (ins, outs) = (self.ports.in_channel_count(), self.ports.out_channel_count());
        self.signal = match format {
            SampleFormat::Float32 => {
                SignalState::Float32(SignalStorage::allocate(ins, outs, max_block))
            }
            SampleFormat::Float64 => {
                SignalState::Float64(SignalStorage::allocate(ins, outs, max_block))
            }
        };
        log::debug!(
            "Prepared {:?} signal storage: {} in, {} out, block {}",
            format,
            ins,
            outs,
            max_block
        );
    }

    unsafe fn render_f32(&mut self, inputs: &[*const f32], outputs: &[*mut f32], num_samples: usize) {
        if !self.lifecycle.is_active() {
            return;
        }
        self.ensure_storage(SampleFormat::Float32, num_samples);
        self.ports.sync_passive();
        if let SignalState::Float32(storage) = &mut self.signal {
            storage.collect(inputs, outputs);
            let external = &mut self.external;
            storage.render(num_samples, |buffer| external.process(buffer));
        }
    }

    unsafe fn render_f64(&mut self, inputs: &[*const f64], outputs: &[*mut f64], num_samples: usize) {
        if !self.lifecycle.is_active() {
            return;
        }
        self.ensure_storage(SampleFormat::Float64, num_samples);
        self.ports.sync_passive();
        if let SignalState::Float64(storage) = &mut self.signal {
            storage.collect(inputs, outputs);
            let external = &mut self.external;
            storage.render(num_samples, |buffer| external.process(buffer));
        }
    }

    unsafe fn render_packed_f32(&mut self, words: &[PerformWord]) {
        if !self.lifecycle.is_active() {
            return;
        }
        let num_samples = words.last().copied().unwrap_or(0);
        self.ensure_storage(SampleFormat::Float32, num_samples);
        self.ports.sync_passive();
        if let SignalState::Float32(storage) = &mut self.signal {
            let n = storage.collect_packed(words);
            let external = &mut self.external;
            storage.render(n, |buffer| external.process(buffer));
        }
    }

    fn teardown(&mut self) {
        if self.lifecycle.state() == LifecycleState::TornDown {
            return;
        }
        if let Err(e) = self.lifecycle.advance(LifecycleState::TornDown) {
            log::error!("{}", e);
        }
        self.ports.clear();
        self.signal = SignalState::Unprepared;
        self.external.exit();
        log::debug!("Torn down instance");
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<E: External> Drop for ExternalInstance<E> {
    fn drop(&mut self) {
        self.teardown();
    }
}
