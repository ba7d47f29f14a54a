//! Two nodes on in-process tokio links, each driven by `run_node`.
//!
//! Run with:
//!   cargo run --example async-two-nodes --features async

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use sensorlink::radio::{LinkHub, TokioTimer};
use sensorlink::transport::{
    run_node, Callbacks, Command, TimerEvent, TransportConfig, TransportEngine,
};
use tokio::sync::mpsc::{self, error::SendError, UnboundedSender};
use tokio_util::sync::CancellationToken;

const CHANNEL: u16 = 1;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let hub = LinkHub::new();
    let (radio_a, inbound_a) = hub.attach(1);
    let (radio_b, inbound_b) = hub.attach(2);
    let (timer_a, timers_a) = TokioTimer::<TimerEvent<u16>>::new();
    let (timer_b, timers_b) = TokioTimer::<TimerEvent<u16>>::new();

    let mut a = TransportEngine::new(radio_a, timer_a, TransportConfig::default())?;
    let mut b = TransportEngine::new(radio_b, timer_b, TransportConfig::default())?;

    let counter = Rc::new(RefCell::new(0u32));
    let next = Rc::clone(&counter);
    a.register_endpoint(
        2,
        CHANNEL,
        true,
        Callbacks::new()
            .on_produce(move |frame, _| {
                *next.borrow_mut() += 1;
                frame
                    .set_payload(format!("hello #{}", next.borrow()).as_bytes())
                    .is_ok()
            })
            .on_event(|event, _| eprintln!("[a] {event}")),
    )?;
    b.register_endpoint(
        1,
        CHANNEL,
        false,
        Callbacks::new()
            .on_consume(|frame, _| {
                eprintln!("[b] {}", String::from_utf8_lossy(frame.payload()));
            })
            .on_event(|event, _| eprintln!("[b] {event}")),
    )?;

    let (cmd_a, commands_a) = mpsc::unbounded_channel();
    let (_cmd_b, commands_b) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();

    let script = {
        let shutdown = shutdown.clone();
        async move {
            let result = drive(&cmd_a).await;
            shutdown.cancel();
            result
        }
    };

    let (a, _b, script) = tokio::join!(
        run_node(a, inbound_a, timers_a, commands_a, shutdown.clone()),
        run_node(b, inbound_b, timers_b, commands_b, shutdown.clone()),
        script
    );
    script?;

    eprintln!(
        "[a] sent {} frames, channel open: {}",
        counter.borrow(),
        a.endpoint(CHANNEL, true).is_some_and(|s| s.is_open())
    );
    Ok(())
}

/// Open the channel, send three messages 50 ms apart, then close it.
async fn drive(commands: &UnboundedSender<Command<u16>>) -> Result<(), SendError<Command<u16>>> {
    commands.send(Command::Open {
        channel: CHANNEL,
        initiator: true,
    })?;
    for _ in 0..3 {
        commands.send(Command::RequestSend {
            channel: CHANNEL,
            initiator: true,
        })?;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    commands.send(Command::Close {
        channel: CHANNEL,
        initiator: true,
    })?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}
