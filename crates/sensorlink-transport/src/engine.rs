use bytes::BytesMut;
use sensorlink_frame::{header_size, ChannelId, Flags, Frame};
use sensorlink_radio::{NodeId, Radio, Timer};
use tracing::{debug, info, trace, warn};

use crate::config::TransportConfig;
use crate::endpoint::{Callbacks, EndpointState};
use crate::error::{channel_name, Result, TransportError};
use crate::registry::Registry;

/// Timer context armed by the engine and handed back to [`TransportEngine::on_timer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent<C> {
    /// Retransmission deadline for the frame sent under `generation`.
    Resend { generation: u64 },
    /// Answer deadline for the endpoint in `slot`.
    AnswerTimeout {
        slot: usize,
        channel: C,
        initiator: bool,
        token: u32,
    },
}

/// Reliable multiplexed transport over one radio.
///
/// At most one frame is outstanding. The scheduler serves endpoints in
/// round-robin order; each acknowledged frame bumps the generation counter,
/// which is what makes older resend timers stale.
pub struct TransportEngine<C, R, T> {
    pub(crate) radio: R,
    pub(crate) timer: T,
    pub(crate) config: TransportConfig,
    pub(crate) registry: Registry<C>,
    pub(crate) sending: Option<Frame<C>>,
    pub(crate) wire: BytesMut,
    pub(crate) cursor: usize,
    pub(crate) generation: u64,
    pub(crate) resends: u32,
    pub(crate) is_sending: bool,
}

impl<C, R, T> TransportEngine<C, R, T>
where
    C: ChannelId,
    R: Radio,
    T: Timer<TimerEvent<C>>,
{
    pub fn new(radio: R, timer: T, config: TransportConfig) -> Result<Self> {
        config.validate()?;
        let capacity = config.capacity;
        Ok(Self {
            wire: BytesMut::with_capacity(radio.max_frame_len()),
            radio,
            timer,
            config,
            registry: Registry::new(capacity),
            sending: None,
            // The first scan starts at slot 0.
            cursor: capacity - 1,
            generation: 0,
            resends: 0,
            is_sending: false,
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Address of the local node.
    pub fn id(&self) -> NodeId {
        self.radio.id()
    }

    pub fn enable_radio(&mut self) -> Result<()> {
        self.radio.enable()?;
        Ok(())
    }

    pub fn disable_radio(&mut self) -> Result<()> {
        self.radio.disable()?;
        Ok(())
    }

    /// Largest payload an outbound frame can carry on this radio.
    pub fn max_payload(&self) -> usize {
        self.radio.max_frame_len().saturating_sub(header_size::<C>())
    }

    /// Bind `callbacks` to (`channel`, `initiator`), talking to `remote`.
    ///
    /// Re-registering an idle pair rebinds it in place.
    pub fn register_endpoint(
        &mut self,
        remote: NodeId,
        channel: C,
        initiator: bool,
        callbacks: Callbacks<C>,
    ) -> Result<()> {
        if callbacks.is_empty() {
            return Err(TransportError::NoCallbacks);
        }
        let idx = self
            .registry
            .find_or_create(channel, initiator, true)
            .ok_or(TransportError::RegistryFull {
                capacity: self.registry.capacity(),
            })?;

        if let Some(ep) = self.registry.get(idx) {
            let active = self.is_sending && self.cursor == idx;
            if ep.is_open() || ep.wants_something() || active {
                return Err(TransportError::EndpointBusy {
                    channel: channel_name(&channel),
                });
            }
        }

        self.registry.bind(idx, remote, channel, initiator, callbacks);
        debug!(?channel, initiator, remote, slot = idx, "endpoint registered");
        Ok(())
    }

    /// State of the endpoint for (`channel`, `initiator`), if registered.
    pub fn endpoint(&self, channel: C, initiator: bool) -> Option<&EndpointState<C>> {
        let idx = self.registry.find(channel, initiator)?;
        self.registry.get(idx).map(|ep| ep.state())
    }

    /// Registered endpoints in slot order.
    pub fn endpoints(&self) -> impl Iterator<Item = &EndpointState<C>> {
        self.registry.iter().map(|(_, ep)| ep.state())
    }

    /// Start the open handshake.
    pub fn open(&mut self, channel: C, initiator: bool) -> Result<()> {
        let idx = self.lookup(channel, initiator)?;
        if let Some(ep) = self.registry.get_mut(idx) {
            if ep.is_open() || ep.wants_open() {
                return Err(TransportError::AlreadyOpen {
                    channel: channel_name(&channel),
                });
            }
            ep.request_open();
            info!(?channel, initiator, "opening channel");
        }
        self.check_send();
        Ok(())
    }

    /// Start the close handshake.
    pub fn close(&mut self, channel: C, initiator: bool) -> Result<()> {
        let idx = self.lookup(channel, initiator)?;
        if let Some(ep) = self.registry.get_mut(idx) {
            if !ep.is_open() {
                return Err(TransportError::NotOpen {
                    channel: channel_name(&channel),
                });
            }
            ep.request_close();
            info!(?channel, initiator, "closing channel");
        }
        self.check_send();
        Ok(())
    }

    /// Ask for one produce call on the endpoint's next send slot.
    pub fn request_send(&mut self, channel: C, initiator: bool) -> Result<()> {
        let idx = self.lookup(channel, initiator)?;
        if let Some(ep) = self.registry.get_mut(idx) {
            ep.request_send();
            trace!(?channel, initiator, slot = idx, "send requested");
        }
        self.check_send();
        Ok(())
    }

    /// Close the channel (ABORT, CLOSE) unless a payload arrives on it
    /// within the answer timeout.
    pub fn expect_answer(&mut self, channel: C, initiator: bool) -> Result<()> {
        let idx = self.lookup(channel, initiator)?;
        if let Some(ep) = self.registry.get_mut(idx) {
            let token = ep.arm_answer();
            self.timer.schedule(
                self.config.answer_timeout(),
                TimerEvent::AnswerTimeout {
                    slot: idx,
                    channel,
                    initiator,
                    token,
                },
            );
            trace!(?channel, initiator, token, "answer expected");
        }
        Ok(())
    }

    pub fn remote_address(&self, channel: C, initiator: bool) -> Option<NodeId> {
        self.endpoint(channel, initiator).map(|ep| ep.remote_address())
    }

    pub fn set_remote_address(&mut self, channel: C, initiator: bool, remote: NodeId) -> Result<()> {
        let idx = self.lookup(channel, initiator)?;
        if let Some(ep) = self.registry.get_mut(idx) {
            ep.set_remote_address(remote);
        }
        Ok(())
    }

    /// Unbind the endpoint and free its slot. No event fires.
    ///
    /// If the endpoint owns the in-flight frame, the frame is abandoned and
    /// the next endpoint is served.
    pub fn destruct(&mut self, channel: C, initiator: bool) -> Result<()> {
        let idx = self.lookup(channel, initiator)?;
        if let Some(ep) = self.registry.get_mut(idx) {
            ep.destruct();
        }
        debug!(?channel, initiator, slot = idx, "endpoint destructed");
        self.release_send_slot(idx);
        self.check_send();
        Ok(())
    }

    /// Handle an expired timer armed by this engine.
    pub fn on_timer(&mut self, event: TimerEvent<C>) {
        match event {
            TimerEvent::Resend { generation } => self.on_resend_timeout(generation),
            TimerEvent::AnswerTimeout {
                slot,
                channel,
                initiator,
                token,
            } => self.on_answer_timeout(slot, channel, initiator, token),
        }
    }

    /// A frame is in flight.
    pub fn is_sending(&self) -> bool {
        self.is_sending
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Transmissions of the in-flight frame so far.
    pub fn resends(&self) -> u32 {
        self.resends
    }

    /// Endpoint owning the in-flight frame.
    pub fn active_endpoint(&self) -> Option<&EndpointState<C>> {
        if !self.is_sending {
            return None;
        }
        self.registry.get(self.cursor).map(|ep| ep.state())
    }

    fn lookup(&self, channel: C, initiator: bool) -> Result<usize> {
        self.registry
            .find(channel, initiator)
            .ok_or_else(|| TransportError::UnknownChannel {
                channel: channel_name(&channel),
                initiator,
            })
    }

    /// Abandon the in-flight frame if the endpoint in `idx` owns it. Its
    /// resend timer goes stale. Returns whether the slot was released.
    pub(crate) fn release_send_slot(&mut self, idx: usize) -> bool {
        if !self.is_sending || self.cursor != idx {
            return false;
        }
        self.generation += 1;
        self.is_sending = false;
        debug!(slot = idx, generation = self.generation, "send slot released");
        true
    }

    /// Advance the cursor to the next live endpoint with pending work,
    /// visiting the last-served slot last.
    fn switch_sending_endpoint(&mut self) -> bool {
        let capacity = self.registry.capacity();
        for step in 1..=capacity {
            let idx = (self.cursor + step) % capacity;
            if self.registry.get(idx).is_some_and(|ep| ep.ready_to_send()) {
                self.cursor = idx;
                self.is_sending = true;
                return true;
            }
        }
        self.is_sending = false;
        false
    }

    /// Start the next transmission if the engine is idle.
    pub(crate) fn check_send(&mut self) {
        if self.is_sending {
            trace!(slot = self.cursor, "send in progress");
            return;
        }
        while self.switch_sending_endpoint() {
            if self.prepare_frame() {
                self.resends = 0;
                self.transmit();
                return;
            }
            self.is_sending = false;
        }
        trace!("nothing to send");
    }

    /// Fill the outbound frame for the endpoint under the cursor. `false`
    /// when there is nothing to put on the air.
    fn prepare_frame(&mut self) -> bool {
        let kind = self.config.message_type;
        let max_payload = self.max_payload();
        let idx = self.cursor;
        let Some(ep) = self.registry.get_mut(idx) else {
            return false;
        };

        let mut flags = Flags::empty();
        flags.set(Flags::INITIATOR, ep.initiator());
        flags.set(Flags::OPEN, ep.wants_open());
        flags.set(Flags::CLOSE, ep.wants_close());
        let channel = ep.channel();
        let sequence = ep.state().sending_sequence();

        let frame = self.sending.get_or_insert_with(|| {
            Frame::new(kind, channel, sequence, flags).with_max_payload(max_payload)
        });
        frame.set_kind(kind);
        frame.set_channel(channel);
        frame.set_sequence(sequence);
        frame.set_flags(flags);
        frame.clear_payload();

        if ep.wants_send() {
            ep.comply_send();
            if !ep.produce(frame) {
                debug!(?channel, slot = idx, "produce declined");
                return false;
            }
        }

        if frame.payload_len() == 0 && !frame.is_open() && !frame.is_close() {
            debug!(?channel, slot = idx, "empty frame skipped");
            return false;
        }
        true
    }

    /// Put the outbound frame on the air and arm its resend timer.
    fn transmit(&mut self) {
        let Some(frame) = self.sending.as_ref() else {
            return;
        };
        let Some(dest) = self.registry.get(self.cursor).map(|ep| ep.remote_address()) else {
            return;
        };

        self.wire.clear();
        frame.encode(&mut self.wire);
        trace!(
            node = self.radio.id(),
            dest,
            channel = ?frame.channel(),
            seq = frame.sequence(),
            flags = %frame.flags(),
            len = frame.payload_len(),
            generation = self.generation,
            attempt = self.resends + 1,
            "transmit"
        );
        if let Err(err) = self.radio.send(dest, &self.wire) {
            warn!(node = self.radio.id(), dest, error = %err, "radio send failed");
        }

        self.resends += 1;
        self.timer.schedule(
            self.config.resend_timeout(),
            TimerEvent::Resend {
                generation: self.generation,
            },
        );
    }

    fn on_resend_timeout(&mut self, generation: u64) {
        if !self.is_sending || generation != self.generation {
            trace!(generation, current = self.generation, "stale resend timer");
            return;
        }
        if self.resends < self.config.max_resends {
            debug!(generation, resends = self.resends, "ack timeout, resending");
            self.transmit();
            return;
        }

        if let Some(ep) = self.registry.get_mut(self.cursor) {
            if ep.is_open() || ep.wants_open() || ep.wants_close() {
                warn!(
                    channel = ?ep.channel(),
                    initiator = ep.initiator(),
                    resends = self.resends,
                    "no acknowledgment, aborting channel"
                );
                ep.abort_produce();
                ep.close();
            } else {
                debug!(channel = ?ep.channel(), "closed channel left a frame in flight");
            }
        }
        self.is_sending = false;
        self.check_send();
    }

    fn on_answer_timeout(&mut self, slot: usize, channel: C, initiator: bool, token: u32) {
        let Some(ep) = self.registry.get_mut(slot) else {
            return;
        };
        if ep.channel() != channel
            || ep.initiator() != initiator
            || ep.state().answer_token() != token
        {
            trace!(?channel, slot, "stale answer timer");
            return;
        }
        if !ep.is_open() || !ep.expects_answer() {
            return;
        }
        warn!(?channel, initiator, "no answer, closing channel");
        ep.abort_produce();
        ep.close();
        if self.release_send_slot(slot) {
            self.check_send();
        }
    }
}

impl<C, R, T> std::fmt::Debug for TransportEngine<C, R, T>
where
    C: std::fmt::Debug,
    R: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportEngine")
            .field("radio", &self.radio)
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("cursor", &self.cursor)
            .field("generation", &self.generation)
            .field("resends", &self.resends)
            .field("is_sending", &self.is_sending)
            .finish()
    }
}
