use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use sensorlink_radio::{
    LossModel, NodeId, SimConfig, SimEvent, SimNetwork, SimRadio, SimStats, SimTimer,
};
use sensorlink_transport::{
    Callbacks, Event, Phase, TimerEvent, TransportConfig, TransportEngine,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::cmd::SimulateArgs;
use crate::exit::{transport_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

const SENDER: NodeId = 1;
const RECEIVER: NodeId = 2;

type Engine = TransportEngine<u16, SimRadio<TimerEvent<u16>>, SimTimer<TimerEvent<u16>>>;

#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct ChannelReport {
    pub channel: u16,
    pub queued: u32,
    pub delivered: u32,
    pub aborted: u32,
    pub opened: u32,
    pub closed: u32,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MediumReport {
    pub sent: u64,
    pub dropped: u64,
    pub delivered: u64,
    pub timers_fired: u64,
}

impl From<SimStats> for MediumReport {
    fn from(stats: SimStats) -> Self {
        Self {
            sent: stats.sent,
            dropped: stats.dropped,
            delivered: stats.delivered,
            timers_fired: stats.timers_fired,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    pub channels: Vec<ChannelReport>,
    pub medium: MediumReport,
    pub expected: u64,
    pub delivered: u64,
    pub elapsed_ms: u64,
    pub complete: bool,
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(&args)?;
    let report = simulate(&args, config)?;
    print_report(&report, format);
    Ok(if report.complete { SUCCESS } else { FAILURE })
}

fn load_config(args: &SimulateArgs) -> CliResult<TransportConfig> {
    let mut config = match &args.config {
        Some(path) => {
            TransportConfig::load(path).map_err(|e| transport_error("load config", e))?
        }
        None => TransportConfig::default(),
    };
    if let Some(ms) = args.resend_timeout_ms {
        config.resend_timeout_ms = ms;
    }
    if let Some(max) = args.max_resends {
        config.max_resends = max;
    }
    config
        .validate()
        .map_err(|e| transport_error("config", e))?;
    check_capacity(args.channels, &config)?;
    Ok(config)
}

fn check_capacity(channels: u16, config: &TransportConfig) -> CliResult<()> {
    if usize::from(channels) > config.capacity {
        return Err(CliError::usage(format!(
            "{channels} channels exceed the registry capacity of {}",
            config.capacity
        )));
    }
    Ok(())
}

/// Sender-side bookkeeping for one channel.
struct Lane {
    channel: u16,
    outbox: Rc<RefCell<VecDeque<Vec<u8>>>>,
    report: Rc<RefCell<ChannelReport>>,
    close_requested: bool,
}

impl Lane {
    fn done(&self, phase: Phase) -> bool {
        self.close_requested && phase == Phase::Closed
    }
}

struct Simulation {
    net: SimNetwork<TimerEvent<u16>>,
    sender: Engine,
    receiver: Engine,
    lanes: Vec<Lane>,
}

pub fn simulate(args: &SimulateArgs, config: TransportConfig) -> CliResult<SimulationReport> {
    let loss = match args.drop_every {
        Some(n) if n > 0 => LossModel::EveryNth(n),
        _ => LossModel::None,
    };
    let net = SimNetwork::new(SimConfig {
        latency: Duration::from_millis(args.latency_ms),
        loss,
        ..SimConfig::default()
    });
    let sender = TransportEngine::new(net.radio(SENDER), net.timer(SENDER), config.clone())
        .map_err(|e| transport_error("sender", e))?;
    let receiver = TransportEngine::new(net.radio(RECEIVER), net.timer(RECEIVER), config)
        .map_err(|e| transport_error("receiver", e))?;

    let mut sim = Simulation {
        net,
        sender,
        receiver,
        lanes: Vec::new(),
    };
    // An empty data frame carries nothing and is never sent.
    let payload_size = args.payload_size.min(sim.sender.max_payload()).max(1);
    for channel in 1..=args.channels {
        sim.add_lane(channel, args.messages, payload_size)?;
    }

    let deadline = Duration::from_millis(args.max_time_ms);
    sim.pump();
    while !sim.finished() {
        let Some((_, event)) = sim.net.next_event_until(deadline) else {
            break;
        };
        sim.dispatch(event);
        sim.pump();
    }

    let elapsed_ms = u64::try_from(sim.net.now().as_millis()).unwrap_or(u64::MAX);
    let channels: Vec<ChannelReport> = sim
        .lanes
        .iter()
        .map(|lane| lane.report.borrow().clone())
        .collect();
    let expected = u64::from(args.messages) * u64::from(args.channels);
    let delivered: u64 = channels.iter().map(|c| u64::from(c.delivered)).sum();
    info!(expected, delivered, elapsed_ms, "simulation finished");

    Ok(SimulationReport {
        complete: delivered == expected,
        channels,
        medium: sim.net.stats().into(),
        expected,
        delivered,
        elapsed_ms,
    })
}

impl Simulation {
    fn add_lane(&mut self, channel: u16, messages: u32, payload_size: usize) -> CliResult<()> {
        let outbox: Rc<RefCell<VecDeque<Vec<u8>>>> = Rc::new(RefCell::new(
            (0..messages)
                .map(|seq| message(channel, seq, payload_size))
                .collect(),
        ));
        let report = Rc::new(RefCell::new(ChannelReport {
            channel,
            queued: messages,
            ..ChannelReport::default()
        }));

        let source = Rc::clone(&outbox);
        let events = Rc::clone(&report);
        let sender_callbacks = Callbacks::<u16>::new()
            .on_produce(move |frame, _| match source.borrow_mut().pop_front() {
                Some(payload) => frame.set_payload(&payload).is_ok(),
                None => false,
            })
            .on_event(move |event, _| {
                let mut report = events.borrow_mut();
                match event {
                    Event::Open => report.opened += 1,
                    Event::Abort => report.aborted += 1,
                    Event::Close => report.closed += 1,
                }
            });

        let sink = Rc::clone(&report);
        let receiver_callbacks = Callbacks::<u16>::new()
            .on_consume(move |frame, state| {
                debug!(channel = state.channel(), len = frame.payload_len(), "delivered");
                sink.borrow_mut().delivered += 1;
            })
            .on_event(|_, _| {});

        self.sender
            .register_endpoint(RECEIVER, channel, true, sender_callbacks)
            .map_err(|e| transport_error("register sender", e))?;
        self.receiver
            .register_endpoint(SENDER, channel, false, receiver_callbacks)
            .map_err(|e| transport_error("register receiver", e))?;

        self.lanes.push(Lane {
            channel,
            outbox,
            report,
            close_requested: false,
        });
        Ok(())
    }

    fn dispatch(&mut self, event: SimEvent<TimerEvent<u16>>) {
        match event {
            SimEvent::Deliver { from, to, data } => match to {
                SENDER => self.sender.on_receive(from, &data),
                RECEIVER => self.receiver.on_receive(from, &data),
                _ => {}
            },
            SimEvent::Timer { node, context } => match node {
                SENDER => self.sender.on_timer(context),
                RECEIVER => self.receiver.on_timer(context),
                _ => {}
            },
        }
    }

    /// Move every lane forward: open, keep one send request pending while
    /// messages remain, close once the last one is acknowledged. A lane that
    /// was aborted with messages left is reopened.
    fn pump(&mut self) {
        for lane in &mut self.lanes {
            let active = self.sender.active_endpoint().map(|ep| ep.channel());
            let Some(state) = self.sender.endpoint(lane.channel, true) else {
                continue;
            };
            let phase = state.phase();
            let wants_send = state.wants_send();
            let pending = !lane.outbox.borrow().is_empty();

            let result = match phase {
                Phase::Closed if pending => self.sender.open(lane.channel, true),
                Phase::Open if pending && !wants_send => {
                    self.sender.request_send(lane.channel, true)
                }
                Phase::Open if !pending && !wants_send && active != Some(lane.channel) => {
                    lane.close_requested = true;
                    self.sender.close(lane.channel, true)
                }
                _ => Ok(()),
            };
            if let Err(err) = result {
                debug!(channel = lane.channel, error = %err, "lane step refused");
            }
        }
    }

    fn finished(&self) -> bool {
        self.lanes.iter().all(|lane| {
            self.sender
                .endpoint(lane.channel, true)
                .is_some_and(|state| lane.done(state.phase()))
        })
    }
}

fn message(channel: u16, seq: u32, size: usize) -> Vec<u8> {
    let mut payload = format!("ch{channel}#{seq}:").into_bytes();
    payload.resize(size, b'.');
    payload
}

fn print_report(report: &SimulationReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let rows = report
                .channels
                .iter()
                .map(|c| {
                    vec![
                        c.channel.to_string(),
                        c.queued.to_string(),
                        c.delivered.to_string(),
                        c.aborted.to_string(),
                        c.opened.to_string(),
                        c.closed.to_string(),
                    ]
                })
                .collect();
            print_table(
                &["CHANNEL", "QUEUED", "DELIVERED", "ABORTED", "OPENED", "CLOSED"],
                rows,
            );
            print_table(
                &["SENT", "DROPPED", "DELIVERED", "TIMERS", "ELAPSED_MS", "COMPLETE"],
                vec![vec![
                    report.medium.sent.to_string(),
                    report.medium.dropped.to_string(),
                    report.medium.delivered.to_string(),
                    report.medium.timers_fired.to_string(),
                    report.elapsed_ms.to_string(),
                    report.complete.to_string(),
                ]],
            );
        }
        OutputFormat::Pretty => {
            for c in &report.channels {
                println!(
                    "channel={} delivered={}/{} aborted={} opened={} closed={}",
                    c.channel, c.delivered, c.queued, c.aborted, c.opened, c.closed
                );
            }
            println!(
                "medium sent={} dropped={} elapsed_ms={} complete={}",
                report.medium.sent, report.medium.dropped, report.elapsed_ms, report.complete
            );
        }
    }
}
