//! Inbound frame dispatch: acknowledgments complete the in-flight frame,
//! everything else is acknowledged and delivered.

use sensorlink_frame::{peek_kind, ChannelId, Frame};
use sensorlink_radio::{NodeId, Radio, Timer};
use tracing::{debug, info, trace, warn};

use crate::engine::{TimerEvent, TransportEngine};

impl<C, R, T> TransportEngine<C, R, T>
where
    C: ChannelId,
    R: Radio,
    T: Timer<TimerEvent<C>>,
{
    /// Handle a frame received from `from`.
    ///
    /// Frames of other protocols and undecodable frames are dropped.
    pub fn on_receive(&mut self, from: NodeId, data: &[u8]) {
        match peek_kind(data) {
            Some(kind) if kind == self.config.message_type => {}
            kind => {
                trace!(from, ?kind, "ignoring foreign frame");
                return;
            }
        }
        let frame = match Frame::<C>::decode(data, self.max_payload()) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(from, error = %err, "dropping undecodable frame");
                return;
            }
        };

        if frame.is_ack() {
            self.on_receive_ack(from, &frame);
        } else {
            self.send_ack(from, &frame);
            self.on_receive_data(&frame);
        }
    }

    fn on_receive_ack(&mut self, from: NodeId, frame: &Frame<C>) {
        if !self.is_sending {
            trace!(from, channel = ?frame.channel(), "ack while idle");
            return;
        }
        let Some(ep) = self.registry.get_mut(self.cursor) else {
            return;
        };
        if frame.channel() != ep.channel()
            || frame.initiator() != ep.initiator()
            || frame.sequence() != ep.state().sending_sequence()
        {
            debug!(
                from,
                channel = ?frame.channel(),
                seq = frame.sequence(),
                expected_channel = ?ep.channel(),
                expected_seq = ep.state().sending_sequence(),
                "ignoring ack"
            );
            return;
        }

        if ep.wants_open() {
            info!(channel = ?ep.channel(), initiator = ep.initiator(), "channel open");
            ep.open();
        }

        if !ep.is_open() && !ep.wants_close() {
            // Closed underneath the in-flight frame: release the slot only.
            debug!(channel = ?ep.channel(), "ack for closed endpoint");
            self.generation += 1;
            self.is_sending = false;
            self.check_send();
            return;
        }

        self.generation += 1;
        ep.increase_sending_sequence();
        trace!(
            channel = ?ep.channel(),
            seq = frame.sequence(),
            generation = self.generation,
            "ack accepted"
        );

        let carried_close = self.sending.as_ref().is_some_and(|f| f.is_close());
        if carried_close && ep.wants_close() {
            info!(channel = ?ep.channel(), initiator = ep.initiator(), "channel closed");
            ep.close();
        }

        self.is_sending = false;
        self.check_send();
    }

    fn on_receive_data(&mut self, frame: &Frame<C>) {
        let channel = frame.channel();
        let Some(idx) = self.registry.find(channel, !frame.initiator()) else {
            debug!(?channel, "data for unknown channel");
            return;
        };
        let Some(ep) = self.registry.get_mut(idx) else {
            return;
        };
        let mut closed = false;

        if frame.is_open() {
            info!(?channel, initiator = ep.initiator(), "channel opened by peer");
            ep.open();
        } else if frame.sequence() != ep.state().receiving_sequence() {
            debug!(
                ?channel,
                seq = frame.sequence(),
                expected = ep.state().receiving_sequence(),
                "out-of-sequence frame"
            );
            return;
        }

        if frame.is_close() {
            if !ep.is_open() {
                debug!(?channel, "close for closed channel");
                return;
            }
            info!(?channel, initiator = ep.initiator(), "channel closed by peer");
            ep.close();
            closed = true;
        }

        if frame.payload_len() > 0 {
            ep.set_expect_answer(false);
            ep.consume(frame);
        }
        ep.increase_receiving_sequence();

        // A frame of ours still in flight on this channel will never be acked.
        if closed && self.release_send_slot(idx) {
            self.check_send();
        }
    }

    fn send_ack(&mut self, to: NodeId, frame: &Frame<C>) {
        let ack = frame.ack();
        self.wire.clear();
        ack.encode(&mut self.wire);
        trace!(to, channel = ?ack.channel(), seq = ack.sequence(), "ack");
        if let Err(err) = self.radio.send(to, &self.wire) {
            warn!(to, error = %err, "sending ack failed");
        }
    }
}
