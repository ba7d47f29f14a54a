//! One end of a logical channel.
//!
//! An [`Endpoint`] pairs the per-channel protocol state ([`EndpointState`])
//! with the application's [`Callbacks`]. Callbacks receive a shared view of
//! the state, never the endpoint itself, so they cannot re-enter the engine.

use std::fmt;

use sensorlink_frame::Frame;
use sensorlink_radio::NodeId;

/// Lifecycle notification delivered to the event callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// The in-flight frame was given up; CLOSE follows.
    Abort,
    /// The channel opened, locally acknowledged or remotely requested.
    Open,
    /// The channel closed.
    Close,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Abort => f.write_str("abort"),
            Event::Open => f.write_str("open"),
            Event::Close => f.write_str("close"),
        }
    }
}

/// Coarse lifecycle position derived from the endpoint flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Closed,
    Opening,
    Open,
    Closing,
}

/// Protocol state of an endpoint, as seen by callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointState<C> {
    remote_address: NodeId,
    channel: C,
    initiator: bool,
    sending_sequence: u16,
    receiving_sequence: u16,
    open: bool,
    request_open: bool,
    request_send: bool,
    request_close: bool,
    expect_answer: bool,
    answer_token: u32,
}

impl<C: Copy> EndpointState<C> {
    fn new(remote_address: NodeId, channel: C, initiator: bool) -> Self {
        Self {
            remote_address,
            channel,
            initiator,
            sending_sequence: 0,
            receiving_sequence: 0,
            open: false,
            request_open: false,
            request_send: false,
            request_close: false,
            expect_answer: false,
            answer_token: 0,
        }
    }

    pub fn remote_address(&self) -> NodeId {
        self.remote_address
    }

    pub fn channel(&self) -> C {
        self.channel
    }

    pub fn initiator(&self) -> bool {
        self.initiator
    }

    /// Sequence number of the next outbound frame.
    pub fn sending_sequence(&self) -> u16 {
        self.sending_sequence
    }

    /// Sequence number expected on the next inbound frame.
    pub fn receiving_sequence(&self) -> u16 {
        self.receiving_sequence
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn wants_open(&self) -> bool {
        self.request_open
    }

    pub fn wants_send(&self) -> bool {
        self.request_send
    }

    pub fn wants_close(&self) -> bool {
        self.request_close
    }

    pub fn wants_something(&self) -> bool {
        self.request_open || self.request_send || self.request_close
    }

    pub fn expects_answer(&self) -> bool {
        self.expect_answer
    }

    pub fn phase(&self) -> Phase {
        if self.open {
            Phase::Open
        } else if self.request_open {
            Phase::Opening
        } else if self.request_close {
            Phase::Closing
        } else {
            Phase::Closed
        }
    }

    pub(crate) fn answer_token(&self) -> u32 {
        self.answer_token
    }
}

/// Fills the outbound frame; returns `false` when there is nothing to send.
pub type ProduceFn<C> = Box<dyn FnMut(&mut Frame<C>, &EndpointState<C>) -> bool>;
/// Receives an accepted inbound frame.
pub type ConsumeFn<C> = Box<dyn FnMut(&Frame<C>, &EndpointState<C>)>;
/// Receives lifecycle events.
pub type EventFn<C> = Box<dyn FnMut(Event, &EndpointState<C>)>;

/// Application hooks bound to an endpoint. Any of them may be absent.
pub struct Callbacks<C> {
    produce: Option<ProduceFn<C>>,
    consume: Option<ConsumeFn<C>>,
    event: Option<EventFn<C>>,
}

impl<C> Default for Callbacks<C> {
    fn default() -> Self {
        Self {
            produce: None,
            consume: None,
            event: None,
        }
    }
}

impl<C> fmt::Debug for Callbacks<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("produce", &self.produce.is_some())
            .field("consume", &self.consume.is_some())
            .field("event", &self.event.is_some())
            .finish()
    }
}

impl<C> Callbacks<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_produce(
        mut self,
        f: impl FnMut(&mut Frame<C>, &EndpointState<C>) -> bool + 'static,
    ) -> Self {
        self.produce = Some(Box::new(f));
        self
    }

    pub fn on_consume(mut self, f: impl FnMut(&Frame<C>, &EndpointState<C>) + 'static) -> Self {
        self.consume = Some(Box::new(f));
        self
    }

    pub fn on_event(mut self, f: impl FnMut(Event, &EndpointState<C>) + 'static) -> Self {
        self.event = Some(Box::new(f));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.produce.is_none() && self.consume.is_none() && self.event.is_none()
    }
}

/// Per-channel state machine plus its application bindings.
///
/// `Closed -> Opening -> Open -> Closing -> Closed`; an abort moves an open
/// or opening endpoint straight to `Closed`, emitting ABORT then CLOSE.
pub struct Endpoint<C> {
    state: EndpointState<C>,
    callbacks: Callbacks<C>,
}

impl<C: fmt::Debug> fmt::Debug for Endpoint<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("state", &self.state)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

impl<C: Copy> Endpoint<C> {
    pub fn new(
        remote_address: NodeId,
        channel: C,
        initiator: bool,
        callbacks: Callbacks<C>,
    ) -> Self {
        Self {
            state: EndpointState::new(remote_address, channel, initiator),
            callbacks,
        }
    }

    /// Rebind every attribute; counters and flags start from scratch.
    pub fn init(
        &mut self,
        remote_address: NodeId,
        channel: C,
        initiator: bool,
        callbacks: Callbacks<C>,
    ) {
        let token = self.state.answer_token;
        self.state = EndpointState::new(remote_address, channel, initiator);
        // Keep answer tokens unique per slot so earlier timers stay stale.
        self.state.answer_token = token.wrapping_add(1);
        self.callbacks = callbacks;
    }

    pub fn state(&self) -> &EndpointState<C> {
        &self.state
    }

    pub fn channel(&self) -> C {
        self.state.channel
    }

    pub fn initiator(&self) -> bool {
        self.state.initiator
    }

    pub fn remote_address(&self) -> NodeId {
        self.state.remote_address
    }

    pub fn set_remote_address(&mut self, remote_address: NodeId) {
        self.state.remote_address = remote_address;
    }

    /// Holds at least one callback.
    pub fn used(&self) -> bool {
        !self.callbacks.is_empty()
    }

    pub fn is_open(&self) -> bool {
        self.state.open
    }

    pub fn wants_open(&self) -> bool {
        self.state.request_open
    }

    pub fn wants_send(&self) -> bool {
        self.state.request_send
    }

    pub fn wants_close(&self) -> bool {
        self.state.request_close
    }

    pub fn wants_something(&self) -> bool {
        self.state.wants_something()
    }

    pub fn expects_answer(&self) -> bool {
        self.state.expect_answer
    }

    /// Has work the scheduler may put on the air now. A send request on a
    /// channel that is not open waits for the open to complete.
    pub(crate) fn ready_to_send(&self) -> bool {
        self.wants_open() || self.wants_close() || (self.wants_send() && self.is_open())
    }

    pub fn request_open(&mut self) {
        self.state.sending_sequence = 0;
        self.state.receiving_sequence = 0;
        self.state.request_open = true;
    }

    pub fn open(&mut self) {
        self.fire(Event::Open);
        self.state.sending_sequence = 0;
        self.state.receiving_sequence = 0;
        self.state.request_open = false;
        self.state.request_close = false;
        self.state.open = true;
        self.state.expect_answer = false;
    }

    /// Stop accepting new work; CLOSE fires when the close frame completes.
    pub fn request_close(&mut self) {
        self.state.open = false;
        self.state.request_close = true;
    }

    pub fn close(&mut self) {
        self.fire(Event::Close);
        self.state.sending_sequence = 0;
        self.state.receiving_sequence = 0;
        self.state.request_open = false;
        self.state.request_send = false;
        self.state.request_close = false;
        self.state.open = false;
    }

    pub fn request_send(&mut self) {
        self.state.request_send = true;
    }

    pub fn comply_send(&mut self) {
        self.state.request_send = false;
    }

    /// Ask the application for payload. `false` if it declined or has no
    /// produce callback.
    pub fn produce(&mut self, frame: &mut Frame<C>) -> bool {
        match self.callbacks.produce.as_mut() {
            Some(produce) => produce(frame, &self.state),
            None => false,
        }
    }

    pub fn consume(&mut self, frame: &Frame<C>) {
        if let Some(consume) = self.callbacks.consume.as_mut() {
            consume(frame, &self.state);
        }
    }

    pub fn abort_produce(&mut self) {
        self.fire(Event::Abort);
    }

    pub fn set_expect_answer(&mut self, expect: bool) {
        self.state.expect_answer = expect;
    }

    /// Start a new answer wait; returns its token.
    pub(crate) fn arm_answer(&mut self) -> u32 {
        self.state.expect_answer = true;
        self.state.answer_token = self.state.answer_token.wrapping_add(1);
        self.state.answer_token
    }

    /// Drop the callbacks and all pending work. No event fires.
    pub fn destruct(&mut self) {
        self.callbacks = Callbacks::default();
        self.state.open = false;
        self.state.request_open = false;
        self.state.request_send = false;
        self.state.request_close = false;
        self.state.expect_answer = false;
    }

    pub(crate) fn increase_sending_sequence(&mut self) {
        self.state.sending_sequence = self.state.sending_sequence.wrapping_add(1);
    }

    pub(crate) fn increase_receiving_sequence(&mut self) {
        self.state.receiving_sequence = self.state.receiving_sequence.wrapping_add(1);
    }

    fn fire(&mut self, event: Event) {
        if let Some(handler) = self.callbacks.event.as_mut() {
            handler(event, &self.state);
        }
    }
}
