//! Deterministic simulated radio medium.
//!
//! A [`SimNetwork`] is a single-threaded event queue over a virtual clock.
//! Every node gets a [`SimRadio`] and a [`SimTimer`] bound to the same
//! network; transmissions and timer expiries become [`SimEvent`]s that the
//! caller pops with [`SimNetwork::next_event`] and forwards to the right
//! engine. Nothing happens behind the caller's back, so runs are exactly
//! reproducible.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::error::{RadioError, Result};
use crate::traits::{NodeId, Radio, Timer, BROADCAST_ADDRESS};

/// Default maximum frame length (IEEE 802.15.4 class radios).
pub const DEFAULT_MAX_FRAME_LEN: usize = 116;

/// Default one-hop propagation delay.
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(10);

/// Which frames the medium loses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LossModel {
    /// Lossless medium.
    #[default]
    None,
    /// Lose every n-th frame put on the air, counting from 1. `0` disables.
    EveryNth(u64),
}

/// Configuration for a simulated medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    /// Delay between `send` and delivery.
    pub latency: Duration,
    /// Maximum frame length accepted by every radio.
    pub max_frame_len: usize,
    /// Background loss.
    pub loss: LossModel,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            latency: DEFAULT_LATENCY,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            loss: LossModel::None,
        }
    }
}

/// Medium counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Frames handed to any radio.
    pub sent: u64,
    /// Frames lost on the air or addressed to an absent/disabled node.
    pub dropped: u64,
    /// Frames handed back by `next_event` for delivery.
    pub delivered: u64,
    /// Timer expiries handed back by `next_event`.
    pub timers_fired: u64,
}

/// Something that happens on the medium at a point in virtual time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent<E> {
    /// `data` sent by `from` arrives at `to`.
    Deliver { from: NodeId, to: NodeId, data: Bytes },
    /// A timer armed by `node` expires.
    Timer { node: NodeId, context: E },
}

struct Scheduled<E> {
    at: Duration,
    order: u64,
    event: SimEvent<E>,
}

// Min-heap on (at, order): earliest first, FIFO among equal timestamps.
impl<E> Ord for Scheduled<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl<E> PartialOrd for Scheduled<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> PartialEq for Scheduled<E> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.order == other.order
    }
}

impl<E> Eq for Scheduled<E> {}

struct SimState<E> {
    config: SimConfig,
    now: Duration,
    next_order: u64,
    queue: BinaryHeap<Scheduled<E>>,
    nodes: BTreeSet<NodeId>,
    disabled: BTreeSet<NodeId>,
    on_air: u64,
    drop_any: u64,
    drop_from: HashMap<NodeId, u64>,
    stats: SimStats,
}

impl<E> SimState<E> {
    fn push(&mut self, at: Duration, event: SimEvent<E>) {
        let order = self.next_order;
        self.next_order += 1;
        self.queue.push(Scheduled { at, order, event });
    }

    fn should_drop(&mut self, from: NodeId) -> bool {
        self.on_air += 1;
        if let Some(remaining) = self.drop_from.get_mut(&from) {
            if *remaining > 0 {
                *remaining -= 1;
                return true;
            }
        }
        if self.drop_any > 0 {
            self.drop_any -= 1;
            return true;
        }
        match self.config.loss {
            LossModel::None => false,
            LossModel::EveryNth(n) => n > 0 && self.on_air % n == 0,
        }
    }
}

/// Shared handle to a simulated medium.
///
/// `E` is the timer context type of the engines attached to it.
pub struct SimNetwork<E> {
    state: Rc<RefCell<SimState<E>>>,
}

impl<E> Clone for SimNetwork<E> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<E> fmt::Debug for SimNetwork<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SimNetwork")
            .field("now", &state.now)
            .field("pending", &state.queue.len())
            .field("nodes", &state.nodes)
            .field("stats", &state.stats)
            .finish()
    }
}

impl<E> Default for SimNetwork<E> {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl<E> SimNetwork<E> {
    /// Create an empty medium.
    pub fn new(config: SimConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(SimState {
                config,
                now: Duration::ZERO,
                next_order: 0,
                queue: BinaryHeap::new(),
                nodes: BTreeSet::new(),
                disabled: BTreeSet::new(),
                on_air: 0,
                drop_any: 0,
                drop_from: HashMap::new(),
                stats: SimStats::default(),
            })),
        }
    }

    /// Attach node `id` and return its radio.
    pub fn radio(&self, id: NodeId) -> SimRadio<E> {
        self.state.borrow_mut().nodes.insert(id);
        SimRadio {
            id,
            network: self.clone(),
        }
    }

    /// Return a timer that reports expiries on behalf of node `id`.
    pub fn timer(&self, id: NodeId) -> SimTimer<E> {
        SimTimer {
            id,
            network: self.clone(),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// Number of queued events.
    pub fn pending(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Medium counters so far.
    pub fn stats(&self) -> SimStats {
        self.state.borrow().stats
    }

    /// Replace the background loss model.
    pub fn set_loss(&self, loss: LossModel) {
        self.state.borrow_mut().config.loss = loss;
    }

    /// Lose the next `count` frames, whoever sends them.
    pub fn drop_next(&self, count: u64) {
        self.state.borrow_mut().drop_any += count;
    }

    /// Lose the next `count` frames sent by `node`.
    pub fn drop_next_from(&self, node: NodeId, count: u64) {
        *self
            .state
            .borrow_mut()
            .drop_from
            .entry(node)
            .or_insert(0) += count;
    }

    /// Pop the earliest event and advance the clock to it.
    pub fn next_event(&self) -> Option<(Duration, SimEvent<E>)> {
        loop {
            let mut state = self.state.borrow_mut();
            let scheduled = state.queue.pop()?;
            state.now = state.now.max(scheduled.at);

            match &scheduled.event {
                SimEvent::Deliver { to, .. }
                    if state.disabled.contains(to) || !state.nodes.contains(to) =>
                {
                    trace!(to, "receiver absent or disabled; frame lost");
                    state.stats.dropped += 1;
                    continue;
                }
                SimEvent::Deliver { .. } => state.stats.delivered += 1,
                SimEvent::Timer { .. } => state.stats.timers_fired += 1,
            }

            return Some((state.now, scheduled.event));
        }
    }

    /// Like [`next_event`](Self::next_event), but never past `deadline`.
    ///
    /// When the next event lies beyond `deadline` (or nothing is queued) the
    /// clock moves to `deadline` and `None` is returned.
    pub fn next_event_until(&self, deadline: Duration) -> Option<(Duration, SimEvent<E>)> {
        let due = {
            let state = self.state.borrow();
            state.queue.peek().map(|s| s.at <= deadline).unwrap_or(false)
        };
        if due {
            return self.next_event();
        }
        let mut state = self.state.borrow_mut();
        state.now = state.now.max(deadline);
        None
    }

    fn transmit(&self, from: NodeId, to: NodeId, data: &[u8]) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if data.len() > state.config.max_frame_len {
            return Err(RadioError::FrameTooLarge {
                len: data.len(),
                max: state.config.max_frame_len,
            });
        }
        if state.disabled.contains(&from) {
            return Err(RadioError::Disabled(from));
        }

        state.stats.sent += 1;
        if state.should_drop(from) {
            state.stats.dropped += 1;
            debug!(from, to, len = data.len(), "frame lost on the air");
            return Ok(());
        }

        let at = state.now + state.config.latency;
        let data = Bytes::copy_from_slice(data);
        if to == BROADCAST_ADDRESS {
            let targets: Vec<NodeId> = state.nodes.iter().copied().filter(|n| *n != from).collect();
            for target in targets {
                state.push(
                    at,
                    SimEvent::Deliver {
                        from,
                        to: target,
                        data: data.clone(),
                    },
                );
            }
        } else {
            state.push(at, SimEvent::Deliver { from, to, data });
        }
        trace!(from, to, ?at, "frame queued");
        Ok(())
    }

    fn arm(&self, node: NodeId, delay: Duration, context: E) {
        let mut state = self.state.borrow_mut();
        let at = state.now + delay;
        state.push(at, SimEvent::Timer { node, context });
    }

    fn set_enabled(&self, node: NodeId, enabled: bool) {
        let mut state = self.state.borrow_mut();
        if enabled {
            state.disabled.remove(&node);
        } else {
            state.disabled.insert(node);
        }
    }

    fn max_frame_len(&self) -> usize {
        self.state.borrow().config.max_frame_len
    }
}

/// A node's radio on a [`SimNetwork`].
pub struct SimRadio<E> {
    id: NodeId,
    network: SimNetwork<E>,
}

impl<E> fmt::Debug for SimRadio<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimRadio").field("id", &self.id).finish()
    }
}

impl<E> Radio for SimRadio<E> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn max_frame_len(&self) -> usize {
        self.network.max_frame_len()
    }

    fn send(&mut self, dest: NodeId, data: &[u8]) -> Result<()> {
        self.network.transmit(self.id, dest, data)
    }

    fn enable(&mut self) -> Result<()> {
        self.network.set_enabled(self.id, true);
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        self.network.set_enabled(self.id, false);
        Ok(())
    }
}

/// A node's timer on a [`SimNetwork`].
pub struct SimTimer<E> {
    id: NodeId,
    network: SimNetwork<E>,
}

impl<E> fmt::Debug for SimTimer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimTimer").field("id", &self.id).finish()
    }
}

impl<E> Timer<E> for SimTimer<E> {
    fn schedule(&mut self, delay: Duration, context: E) {
        self.network.arm(self.id, delay, context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deliveries(net: &SimNetwork<u32>) -> Vec<(NodeId, NodeId, Vec<u8>)> {
        let mut out = Vec::new();
        while let Some((_, event)) = net.next_event() {
            if let SimEvent::Deliver { from, to, data } = event {
                out.push((from, to, data.to_vec()));
            }
        }
        out
    }

    #[test]
    fn delivers_after_latency() {
        let net: SimNetwork<u32> = SimNetwork::default();
        let mut a = net.radio(1);
        let _b = net.radio(2);

        a.send(2, b"ping").unwrap();
        assert_eq!(net.pending(), 1);

        let (at, event) = net.next_event().unwrap();
        assert_eq!(at, DEFAULT_LATENCY);
        assert_eq!(
            event,
            SimEvent::Deliver {
                from: 1,
                to: 2,
                data: Bytes::from_static(b"ping"),
            }
        );
        assert_eq!(net.stats().delivered, 1);
    }

    #[test]
    fn timers_and_frames_interleave_by_time() {
        let net: SimNetwork<u32> = SimNetwork::default();
        let mut a = net.radio(1);
        let _b = net.radio(2);
        let mut timer = net.timer(1);

        timer.schedule(Duration::from_millis(5), 7);
        a.send(2, b"x").unwrap();
        timer.schedule(Duration::from_millis(50), 8);

        let (t1, e1) = net.next_event().unwrap();
        assert_eq!(t1, Duration::from_millis(5));
        assert_eq!(e1, SimEvent::Timer { node: 1, context: 7 });

        let (t2, e2) = net.next_event().unwrap();
        assert_eq!(t2, Duration::from_millis(10));
        assert!(matches!(e2, SimEvent::Deliver { to: 2, .. }));

        let (t3, e3) = net.next_event().unwrap();
        assert_eq!(t3, Duration::from_millis(50));
        assert_eq!(e3, SimEvent::Timer { node: 1, context: 8 });
        assert!(net.next_event().is_none());
    }

    #[test]
    fn equal_timestamps_are_fifo() {
        let net: SimNetwork<u32> = SimNetwork::default();
        let mut timer = net.timer(1);
        for ctx in 0..4 {
            timer.schedule(Duration::from_millis(100), ctx);
        }
        let order: Vec<u32> = std::iter::from_fn(|| net.next_event())
            .map(|(_, e)| match e {
                SimEvent::Timer { context, .. } => context,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn every_nth_loss() {
        let net: SimNetwork<u32> = SimNetwork::new(SimConfig {
            loss: LossModel::EveryNth(3),
            ..SimConfig::default()
        });
        let mut a = net.radio(1);
        let _b = net.radio(2);
        for i in 0..6u8 {
            a.send(2, &[i]).unwrap();
        }
        let got: Vec<u8> = deliveries(&net).into_iter().map(|(_, _, d)| d[0]).collect();
        assert_eq!(got, vec![0, 1, 3, 4]);
        assert_eq!(net.stats().sent, 6);
        assert_eq!(net.stats().dropped, 2);
    }

    #[test]
    fn directed_drop_only_hits_sender() {
        let net: SimNetwork<u32> = SimNetwork::default();
        let mut a = net.radio(1);
        let mut b = net.radio(2);
        net.drop_next_from(2, 1);

        a.send(2, b"a1").unwrap();
        b.send(1, b"b1").unwrap();
        b.send(1, b"b2").unwrap();

        let got = deliveries(&net);
        assert_eq!(
            got,
            vec![(1, 2, b"a1".to_vec()), (2, 1, b"b2".to_vec())]
        );
    }

    #[test]
    fn broadcast_reaches_every_other_node() {
        let net: SimNetwork<u32> = SimNetwork::default();
        let mut a = net.radio(1);
        let _b = net.radio(2);
        let _c = net.radio(3);

        a.send(BROADCAST_ADDRESS, b"hi").unwrap();
        let targets: Vec<NodeId> = deliveries(&net).into_iter().map(|(_, to, _)| to).collect();
        assert_eq!(targets, vec![2, 3]);
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let net: SimNetwork<u32> = SimNetwork::default();
        let mut a = net.radio(1);
        let err = a.send(2, &[0u8; DEFAULT_MAX_FRAME_LEN + 1]).unwrap_err();
        assert!(matches!(err, RadioError::FrameTooLarge { .. }));
        assert_eq!(net.stats().sent, 0);
    }

    #[test]
    fn disabled_radio_neither_sends_nor_receives() {
        let net: SimNetwork<u32> = SimNetwork::default();
        let mut a = net.radio(1);
        let mut b = net.radio(2);

        a.disable().unwrap();
        assert!(matches!(a.send(2, b"x"), Err(RadioError::Disabled(1))));

        a.enable().unwrap();
        b.disable().unwrap();
        a.send(2, b"x").unwrap();
        assert!(net.next_event().is_none());
        assert_eq!(net.stats().dropped, 1);
    }

    #[test]
    fn next_event_until_advances_clock() {
        let net: SimNetwork<u32> = SimNetwork::default();
        let mut timer = net.timer(1);
        timer.schedule(Duration::from_millis(500), 1);

        assert!(net.next_event_until(Duration::from_millis(200)).is_none());
        assert_eq!(net.now(), Duration::from_millis(200));

        let (at, _) = net
            .next_event_until(Duration::from_millis(500))
            .expect("timer due at deadline");
        assert_eq!(at, Duration::from_millis(500));
    }
}
