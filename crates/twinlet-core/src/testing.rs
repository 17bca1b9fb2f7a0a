//! Recording host binding for unit tests.

use std::cell::RefCell;
use std::rc::Rc;

use crate::binding::{DispatchStrategy, HostBinding, InletRequest, LayoutPorts, OutletRequest};
use crate::error::PortResult;
use crate::port::{HostHandle, Message, MessageKind, PortHandle};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    BindInlet { index: usize, kind: MessageKind, slot: Option<usize> },
    BindOutlet { index: usize, kind: MessageKind },
    LayoutInlet(usize),
    LayoutOutlet(usize),
    ReleaseInlet(usize),
    ReleaseOutlet(usize),
    Sent(usize, Message),
    Post(String),
}

#[derive(Clone)]
pub struct RecordingBinding {
    strategy: DispatchStrategy,
    slot_kinds: Vec<(MessageKind, MessageKind)>,
    deferred: bool,
    events: Rc<RefCell<Vec<Event>>>,
}

impl RecordingBinding {
    pub fn new(strategy: DispatchStrategy) -> Self {
        Self {
            strategy,
            slot_kinds: Vec::new(),
            deferred: false,
            events: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn with_slot_kind(mut self, from: MessageKind, to: MessageKind) -> Self {
        self.slot_kinds.push((from, to));
        self
    }

    /// Create host objects during layout (right to left) instead of on declaration.
    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    pub fn take_events(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn posts(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Post(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn handle(&self, port: PortRef) -> HostHandle {
        Box::new(RecordingHandle {
            port,
            events: self.events.clone(),
        })
    }
}

impl HostBinding for RecordingBinding {
    fn strategy(&self) -> DispatchStrategy {
        self.strategy
    }

    fn slot_kind(&self, kind: MessageKind) -> MessageKind {
        self.slot_kinds
            .iter()
            .find(|(from, _)| *from == kind)
            .map(|(_, to)| *to)
            .unwrap_or(kind)
    }

    fn bind_inlet(&self, request: &InletRequest<'_>) -> PortResult<Option<HostHandle>> {
        self.events.borrow_mut().push(Event::BindInlet {
            index: request.index,
            kind: request.kind,
            slot: request.slot,
        });
        if self.deferred {
            return Ok(None);
        }
        Ok(Some(self.handle(PortRef::Inlet(request.index))))
    }

    fn bind_outlet(&self, request: &OutletRequest<'_>) -> PortResult<Option<HostHandle>> {
        self.events.borrow_mut().push(Event::BindOutlet {
            index: request.index,
            kind: request.kind,
        });
        if self.deferred {
            return Ok(None);
        }
        Ok(Some(self.handle(PortRef::Outlet(request.index))))
    }

    fn layout(&self, ports: &mut LayoutPorts<'_>) -> PortResult<()> {
        if !self.deferred {
            return Ok(());
        }
        for index in (0..ports.inlets().len()).rev() {
            self.events.borrow_mut().push(Event::LayoutInlet(index));
            ports.attach_inlet(index, self.handle(PortRef::Inlet(index)))?;
        }
        for index in (0..ports.outlets().len()).rev() {
            self.events.borrow_mut().push(Event::LayoutOutlet(index));
            ports.attach_outlet(index, self.handle(PortRef::Outlet(index)))?;
        }
        Ok(())
    }

    fn post(&self, message: &str) {
        self.events.borrow_mut().push(Event::Post(message.to_string()));
    }
}

#[derive(Clone, Copy)]
enum PortRef {
    Inlet(usize),
    Outlet(usize),
}

struct RecordingHandle {
    port: PortRef,
    events: Rc<RefCell<Vec<Event>>>,
}

impl PortHandle for RecordingHandle {
    fn send(&self, message: &Message) -> bool {
        match self.port {
            PortRef::Outlet(index) => {
                self.events
                    .borrow_mut()
                    .push(Event::Sent(index, message.clone()));
                true
            }
            PortRef::Inlet(_) => false,
        }
    }
}

impl Drop for RecordingHandle {
    fn drop(&mut self) {
        let event = match self.port {
            PortRef::Inlet(index) => Event::ReleaseInlet(index),
            PortRef::Outlet(index) => Event::ReleaseOutlet(index),
        };
        self.events.borrow_mut().push(event);
    }
}
