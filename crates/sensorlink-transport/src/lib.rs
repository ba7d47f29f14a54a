//! Reliable, multiplexed transport for wireless sensor nodes.
//!
//! A [`TransportEngine`] layers acknowledged, ordered delivery with bounded
//! retransmission over a best-effort [`Radio`], and multiplexes up to
//! `capacity` logical channels over it. Exactly one frame is in flight per
//! engine: the scheduler picks the next [`Endpoint`] with pending work in
//! round-robin order, transmits, and waits for the matching acknowledgment
//! or gives up after `max_resends` attempts.
//!
//! The engine never blocks and owns no threads. Whoever drives it forwards
//! radio receptions to [`TransportEngine::on_receive`] and timer expiries to
//! [`TransportEngine::on_timer`]. With the `async` feature, [`driver`] does
//! that on a tokio runtime.
//!
//! [`Radio`]: sensorlink_radio::Radio

pub mod config;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod registry;

mod receive;

#[cfg(feature = "async")]
pub mod driver;

pub use config::TransportConfig;
pub use endpoint::{Callbacks, Endpoint, EndpointState, Event, Phase};
pub use engine::{TimerEvent, TransportEngine};
pub use error::{Result, TransportError};
pub use registry::Registry;

#[cfg(feature = "async")]
pub use driver::{run_node, Command};
