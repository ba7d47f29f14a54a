//! In-process radio links over tokio channels.
//!
//! A [`LinkHub`] plays the role of the shared medium: every attached node
//! gets a [`LinkRadio`] for sending and a receiver of [`Inbound`] frames.
//! Delivery is immediate and lossless; the hub exists so async nodes can be
//! exercised without hardware.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{RadioError, Result};
use crate::sim::DEFAULT_MAX_FRAME_LEN;
use crate::traits::{NodeId, Radio, BROADCAST_ADDRESS};

/// A frame received from the medium.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub from: NodeId,
    pub data: Bytes,
}

type Peers = Arc<Mutex<HashMap<NodeId, mpsc::UnboundedSender<Inbound>>>>;

/// Shared medium connecting [`LinkRadio`]s.
#[derive(Debug, Clone, Default)]
pub struct LinkHub {
    peers: Peers,
}

impl LinkHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach node `id`; replaces any earlier attachment of the same id.
    pub fn attach(&self, id: NodeId) -> (LinkRadio, mpsc::UnboundedReceiver<Inbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().insert(id, tx);
        let radio = LinkRadio {
            id,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            enabled: true,
            peers: Arc::clone(&self.peers),
        };
        (radio, rx)
    }

    /// Detach node `id`; later sends to it fail with `Unreachable`.
    pub fn detach(&self, id: NodeId) {
        self.lock().remove(&id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<NodeId, mpsc::UnboundedSender<Inbound>>> {
        self.peers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A node's radio on a [`LinkHub`].
#[derive(Debug)]
pub struct LinkRadio {
    id: NodeId,
    max_frame_len: usize,
    enabled: bool,
    peers: Peers,
}

impl LinkRadio {
    /// Override the maximum frame length.
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }
}

impl Radio for LinkRadio {
    fn id(&self) -> NodeId {
        self.id
    }

    fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    fn send(&mut self, dest: NodeId, data: &[u8]) -> Result<()> {
        if !self.enabled {
            return Err(RadioError::Disabled(self.id));
        }
        if data.len() > self.max_frame_len {
            return Err(RadioError::FrameTooLarge {
                len: data.len(),
                max: self.max_frame_len,
            });
        }

        let frame = Inbound {
            from: self.id,
            data: Bytes::copy_from_slice(data),
        };
        let peers = self.peers.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if dest == BROADCAST_ADDRESS {
            for (id, tx) in peers.iter().filter(|(id, _)| **id != self.id) {
                trace!(from = self.id, to = *id, "broadcast frame");
                if tx.send(frame.clone()).is_err() {
                    trace!(to = *id, "peer receiver closed");
                }
            }
            return Ok(());
        }

        let tx = peers.get(&dest).ok_or(RadioError::Unreachable(dest))?;
        trace!(from = self.id, to = dest, len = data.len(), "frame sent");
        tx.send(frame).map_err(|_| RadioError::Shutdown)
    }

    fn enable(&mut self) -> Result<()> {
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        self.enabled = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_reach_the_addressed_node() {
        let hub = LinkHub::new();
        let (mut a, _rx_a) = hub.attach(1);
        let (_b, mut rx_b) = hub.attach(2);

        a.send(2, b"hello").unwrap();
        let got = rx_b.recv().await.unwrap();
        assert_eq!(got.from, 1);
        assert_eq!(got.data.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn unknown_destination_is_unreachable() {
        let hub = LinkHub::new();
        let (mut a, _rx) = hub.attach(1);
        assert!(matches!(a.send(9, b"x"), Err(RadioError::Unreachable(9))));
    }

    #[tokio::test]
    async fn disabled_radio_refuses_to_send() {
        let hub = LinkHub::new();
        let (mut a, _rx_a) = hub.attach(1);
        let (_b, _rx_b) = hub.attach(2);
        a.disable().unwrap();
        assert!(matches!(a.send(2, b"x"), Err(RadioError::Disabled(1))));
    }

    #[tokio::test]
    async fn closed_receiver_reports_shutdown() {
        let hub = LinkHub::new();
        let (mut a, _rx_a) = hub.attach(1);
        let (_b, rx_b) = hub.attach(2);
        drop(rx_b);
        assert!(matches!(a.send(2, b"x"), Err(RadioError::Shutdown)));
    }
}
