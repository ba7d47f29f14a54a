//! Reliable, multiplexed radio transport for wireless sensor nodes.
//!
//! sensorlink layers acknowledged, ordered delivery with bounded
//! retransmission over a best-effort radio, multiplexing a handful of
//! logical channels over one stop-and-wait sender.
//!
//! # Crate Structure
//!
//! - [`radio`]: Radio and timer capabilities, simulated medium, tokio links
//! - [`frame`]: Frame header codec and channel id encodings
//! - [`transport`]: Endpoints, registry, scheduler and the transport engine

/// Re-export radio types.
pub mod radio {
    pub use sensorlink_radio::*;
}

/// Re-export frame types.
pub mod frame {
    pub use sensorlink_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use sensorlink_transport::*;
}
