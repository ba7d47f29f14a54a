#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use sensorlink_frame::ChannelId;
use sensorlink_radio::{NodeId, SimConfig, SimEvent, SimNetwork, SimRadio, SimTimer};
use sensorlink_transport::{Callbacks, Event, TimerEvent, TransportConfig, TransportEngine};

pub const A: NodeId = 1;
pub const B: NodeId = 2;

pub type Engine<C> = TransportEngine<C, SimRadio<TimerEvent<C>>, SimTimer<TimerEvent<C>>>;

/// What the application callbacks observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record<C> {
    Event {
        node: NodeId,
        channel: C,
        initiator: bool,
        event: Event,
    },
    Consumed {
        node: NodeId,
        channel: C,
        payload: Vec<u8>,
    },
}

pub type Log<C> = Rc<RefCell<Vec<Record<C>>>>;
pub type Outbox = Rc<RefCell<VecDeque<Vec<u8>>>>;

/// Callbacks that log events and payloads and produce from `outbox`.
pub fn recorder<C: ChannelId + 'static>(node: NodeId, log: &Log<C>, outbox: &Outbox) -> Callbacks<C> {
    let events = Rc::clone(log);
    let consumed = Rc::clone(log);
    let outbox = Rc::clone(outbox);
    Callbacks::new()
        .on_event(move |event, state| {
            events.borrow_mut().push(Record::Event {
                node,
                channel: state.channel(),
                initiator: state.initiator(),
                event,
            });
        })
        .on_consume(move |frame, state| {
            consumed.borrow_mut().push(Record::Consumed {
                node,
                channel: state.channel(),
                payload: frame.payload().to_vec(),
            });
        })
        .on_produce(move |frame, _| match outbox.borrow_mut().pop_front() {
            Some(payload) => frame.set_payload(&payload).is_ok(),
            None => false,
        })
}

/// Two engines, `A` and `B`, on one simulated medium.
pub struct Pair<C: ChannelId> {
    pub net: SimNetwork<TimerEvent<C>>,
    pub a: Engine<C>,
    pub b: Engine<C>,
    pub log: Log<C>,
}

impl<C: ChannelId + 'static> Pair<C> {
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    pub fn with_config(config: TransportConfig) -> Self {
        let net = SimNetwork::new(SimConfig::default());
        let a = TransportEngine::new(net.radio(A), net.timer(A), config.clone()).unwrap();
        let b = TransportEngine::new(net.radio(B), net.timer(B), config).unwrap();
        Self {
            net,
            a,
            b,
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn engine(&mut self, node: NodeId) -> &mut Engine<C> {
        if node == A {
            &mut self.a
        } else {
            &mut self.b
        }
    }

    /// Register `channel` on both sides: `A` initiates, `B` responds.
    /// Returns the two outboxes.
    pub fn channel(&mut self, channel: C) -> (Outbox, Outbox) {
        let out_a = Outbox::default();
        let out_b = Outbox::default();
        let cb_a = recorder(A, &self.log, &out_a);
        let cb_b = recorder(B, &self.log, &out_b);
        self.a.register_endpoint(B, channel, true, cb_a).unwrap();
        self.b.register_endpoint(A, channel, false, cb_b).unwrap();
        (out_a, out_b)
    }

    /// Dispatch one medium event. `false` when the queue is empty.
    pub fn step(&mut self) -> bool {
        match self.net.next_event() {
            Some((_, event)) => {
                self.dispatch(event);
                true
            }
            None => false,
        }
    }

    pub fn dispatch(&mut self, event: SimEvent<TimerEvent<C>>) {
        match event {
            SimEvent::Deliver { from, to, data } => self.engine(to).on_receive(from, &data),
            SimEvent::Timer { node, context } => self.engine(node).on_timer(context),
        }
    }

    /// Run until nothing is queued.
    pub fn run_idle(&mut self) {
        for _ in 0..100_000 {
            if !self.step() {
                return;
            }
        }
        panic!("simulation did not settle");
    }

    /// Run every event up to `deadline` (virtual time since start).
    pub fn run_until(&mut self, deadline: Duration) {
        while let Some((_, event)) = self.net.next_event_until(deadline) {
            self.dispatch(event);
        }
    }

    pub fn run_for(&mut self, duration: Duration) {
        let deadline = self.net.now() + duration;
        self.run_until(deadline);
    }

    /// Open `channel` from `A` and let the handshake complete.
    pub fn open(&mut self, channel: C) {
        self.a.open(channel, true).unwrap();
        self.run_for(Duration::from_millis(100));
    }

    pub fn events(&self, node: NodeId, channel: C) -> Vec<Event> {
        self.log
            .borrow()
            .iter()
            .filter_map(|record| match record {
                Record::Event {
                    node: n,
                    channel: c,
                    event,
                    ..
                } if *n == node && *c == channel => Some(*event),
                _ => None,
            })
            .collect()
    }

    pub fn consumed(&self, node: NodeId) -> Vec<(C, Vec<u8>)> {
        self.log
            .borrow()
            .iter()
            .filter_map(|record| match record {
                Record::Consumed {
                    node: n,
                    channel,
                    payload,
                } if *n == node => Some((*channel, payload.clone())),
                _ => None,
            })
            .collect()
    }
}

pub fn push(outbox: &Outbox, payload: &[u8]) {
    outbox.borrow_mut().push_back(payload.to_vec());
}
