//! Tokio driver for a [`TransportEngine`].
//!
//! [`run_node`] owns the engine and feeds it radio receptions, timer
//! expiries and application [`Command`]s until cancelled. Callbacks run on
//! the driving task, so the returned future is `!Send` whenever they are;
//! await it directly or on a `LocalSet`.

use sensorlink_frame::ChannelId;
use sensorlink_radio::{Inbound, NodeId, Radio, Timer};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{TimerEvent, TransportEngine};
use crate::error::Result;

/// Application request forwarded to the engine by [`run_node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<C> {
    Open { channel: C, initiator: bool },
    Close { channel: C, initiator: bool },
    RequestSend { channel: C, initiator: bool },
    ExpectAnswer { channel: C, initiator: bool },
    SetRemoteAddress {
        channel: C,
        initiator: bool,
        remote: NodeId,
    },
    Destruct { channel: C, initiator: bool },
}

impl<C: ChannelId> Command<C> {
    fn apply<R, T>(self, engine: &mut TransportEngine<C, R, T>) -> Result<()>
    where
        R: Radio,
        T: Timer<TimerEvent<C>>,
    {
        match self {
            Command::Open { channel, initiator } => engine.open(channel, initiator),
            Command::Close { channel, initiator } => engine.close(channel, initiator),
            Command::RequestSend { channel, initiator } => engine.request_send(channel, initiator),
            Command::ExpectAnswer { channel, initiator } => {
                engine.expect_answer(channel, initiator)
            }
            Command::SetRemoteAddress {
                channel,
                initiator,
                remote,
            } => engine.set_remote_address(channel, initiator, remote),
            Command::Destruct { channel, initiator } => engine.destruct(channel, initiator),
        }
    }
}

/// Drive `engine` until `shutdown` is cancelled or the inbound link closes.
///
/// Command failures are logged and do not stop the node. Returns the engine
/// for inspection.
pub async fn run_node<C, R, T>(
    mut engine: TransportEngine<C, R, T>,
    mut inbound: UnboundedReceiver<Inbound>,
    mut timers: UnboundedReceiver<TimerEvent<C>>,
    mut commands: UnboundedReceiver<Command<C>>,
    shutdown: CancellationToken,
) -> TransportEngine<C, R, T>
where
    C: ChannelId,
    R: Radio,
    T: Timer<TimerEvent<C>>,
{
    let node = engine.id();
    let mut commands_open = true;
    info!(node, "node started");

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                debug!(node, "shutdown requested");
                break;
            }
            frame = inbound.recv() => match frame {
                Some(Inbound { from, data }) => engine.on_receive(from, &data),
                None => {
                    info!(node, "radio link closed");
                    break;
                }
            },
            event = timers.recv() => match event {
                Some(event) => engine.on_timer(event),
                None => {
                    warn!(node, "timer channel closed");
                    break;
                }
            },
            command = commands.recv(), if commands_open => match command {
                Some(command) => {
                    if let Err(err) = command.apply(&mut engine) {
                        warn!(node, ?command, error = %err, "command failed");
                    }
                }
                None => commands_open = false,
            },
        }
    }

    info!(node, "node stopped");
    engine
}
