//! Two nodes on a simulated radio: node 1 opens a channel, sends three
//! readings and closes it again. Every fourth frame on the air is lost.
//!
//! Run with:
//!   cargo run --example two-nodes

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use sensorlink::radio::{LossModel, NodeId, SimConfig, SimEvent, SimNetwork};
use sensorlink::transport::{Callbacks, Phase, TimerEvent, TransportConfig, TransportEngine};

const SENSOR: NodeId = 1;
const SINK: NodeId = 2;
const CHANNEL: u16 = 3;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let net = SimNetwork::<TimerEvent<u16>>::new(SimConfig {
        latency: Duration::from_millis(20),
        loss: LossModel::EveryNth(4),
        ..SimConfig::default()
    });
    let config = TransportConfig::default().with_resend_timeout(Duration::from_millis(500));
    let mut sensor = TransportEngine::new(net.radio(SENSOR), net.timer(SENSOR), config.clone())?;
    let mut sink = TransportEngine::new(net.radio(SINK), net.timer(SINK), config)?;

    let readings = Rc::new(RefCell::new(VecDeque::from([
        "t=21.5C".to_string(),
        "t=21.7C".to_string(),
        "t=22.0C".to_string(),
    ])));
    let source = Rc::clone(&readings);
    sensor.register_endpoint(
        SINK,
        CHANNEL,
        true,
        Callbacks::new()
            .on_produce(move |frame, _| match source.borrow_mut().pop_front() {
                Some(reading) => frame.set_payload(reading.as_bytes()).is_ok(),
                None => false,
            })
            .on_event(|event, state| eprintln!("[sensor] {event} on channel {}", state.channel())),
    )?;
    sink.register_endpoint(
        SENSOR,
        CHANNEL,
        false,
        Callbacks::new()
            .on_consume(|frame, _| {
                eprintln!("[sink] {}", String::from_utf8_lossy(frame.payload()));
            })
            .on_event(|event, state| eprintln!("[sink] {event} on channel {}", state.channel())),
    )?;

    sensor.open(CHANNEL, true)?;
    let mut closing = false;
    while let Some((at, event)) = net.next_event() {
        match event {
            SimEvent::Deliver { from, to, data } if to == SINK => sink.on_receive(from, &data),
            SimEvent::Deliver { from, data, .. } => sensor.on_receive(from, &data),
            SimEvent::Timer { node, context } if node == SINK => sink.on_timer(context),
            SimEvent::Timer { context, .. } => sensor.on_timer(context),
        }

        let Some(state) = sensor.endpoint(CHANNEL, true) else {
            break;
        };
        let (phase, wants_send) = (state.phase(), state.wants_send());
        let pending = !readings.borrow().is_empty();
        if phase == Phase::Open && pending && !wants_send {
            sensor.request_send(CHANNEL, true)?;
        } else if phase == Phase::Open && !pending && !wants_send && !sensor.is_sending() {
            sensor.close(CHANNEL, true)?;
            closing = true;
        } else if phase == Phase::Closed && closing {
            eprintln!("[sim] done at {}ms", at.as_millis());
            break;
        }
    }

    let stats = net.stats();
    eprintln!(
        "[sim] frames sent={} dropped={} delivered={}",
        stats.sent, stats.dropped, stats.delivered
    );
    Ok(())
}
