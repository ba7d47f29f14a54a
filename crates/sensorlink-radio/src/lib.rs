//! Radio and timer capabilities consumed by the sensorlink transport.
//!
//! This is the lowest layer of sensorlink. The transport engine never talks
//! to hardware directly; it is handed a [`Radio`] (best-effort datagrams to a
//! node address) and a [`Timer`] (one-shot delayed delivery of an opaque
//! context value, no cancellation).
//!
//! Implementations provided here:
//! - [`sim`]: a deterministic, single-threaded virtual-time medium with
//!   configurable latency and loss
//! - `link` / `tokio_timer` (behind the `async` feature): in-process links and
//!   a tokio-backed timer for running nodes on a real clock

pub mod error;
pub mod sim;
pub mod traits;

#[cfg(feature = "async")]
pub mod link;
#[cfg(feature = "async")]
pub mod tokio_timer;

pub use error::{RadioError, Result};
pub use sim::{LossModel, SimConfig, SimEvent, SimNetwork, SimRadio, SimStats, SimTimer};
pub use traits::{NodeId, Radio, Timer, BROADCAST_ADDRESS, NULL_NODE_ID};

#[cfg(feature = "async")]
pub use link::{Inbound, LinkHub, LinkRadio};
#[cfg(feature = "async")]
pub use tokio_timer::TokioTimer;
