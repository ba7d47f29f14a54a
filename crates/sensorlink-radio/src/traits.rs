use std::time::Duration;

use crate::error::Result;

/// Radio node address.
pub type NodeId = u16;

/// Destination that reaches every node in range.
pub const BROADCAST_ADDRESS: NodeId = NodeId::MAX;

/// Address that never names a real node.
pub const NULL_NODE_ID: NodeId = 0;

/// A best-effort datagram radio.
///
/// `send` hands one frame to the medium and returns; delivery is neither
/// confirmed nor ordered. Inbound frames are not pulled through this trait:
/// whoever drives the transport engine forwards each received frame to
/// `TransportEngine::on_receive`.
pub trait Radio {
    /// Address of this node.
    fn id(&self) -> NodeId;

    /// Largest frame (header + payload) the radio accepts.
    fn max_frame_len(&self) -> usize;

    /// Transmit `data` to `dest`.
    fn send(&mut self, dest: NodeId, data: &[u8]) -> Result<()>;

    /// Switch the radio on.
    fn enable(&mut self) -> Result<()> {
        Ok(())
    }

    /// Switch the radio off.
    fn disable(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One-shot timer service.
///
/// `schedule` arranges for `context` to be handed back after `delay`. There
/// is no cancellation: consumers tag the context so a late expiry can be
/// recognised as stale and ignored.
pub trait Timer<E> {
    fn schedule(&mut self, delay: Duration, context: E);
}

impl<R: Radio + ?Sized> Radio for Box<R> {
    fn id(&self) -> NodeId {
        (**self).id()
    }

    fn max_frame_len(&self) -> usize {
        (**self).max_frame_len()
    }

    fn send(&mut self, dest: NodeId, data: &[u8]) -> Result<()> {
        (**self).send(dest, data)
    }

    fn enable(&mut self) -> Result<()> {
        (**self).enable()
    }

    fn disable(&mut self) -> Result<()> {
        (**self).disable()
    }
}

impl<E, T: Timer<E> + ?Sized> Timer<E> for Box<T> {
    fn schedule(&mut self, delay: Duration, context: E) {
        (**self).schedule(delay, context)
    }
}
