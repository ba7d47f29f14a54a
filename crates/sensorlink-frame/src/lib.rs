//! Wire codec for sensorlink frames.
//!
//! Every frame carries a fixed header followed by an optional payload:
//! - a 1-byte protocol type tag, so co-resident protocols can share the radio
//! - a 1-byte flag set (INITIATOR, OPEN, CLOSE, ACK)
//! - a 2-byte little-endian sequence number
//! - the channel id, encoded by its [`ChannelId`] implementation
//!
//! The payload fills the rest of the radio frame.

pub mod channel;
pub mod codec;
pub mod error;

pub use channel::{ChannelId, RuleChannel};
pub use codec::{header_size, peek_kind, Flags, Frame, FIXED_HEADER_SIZE, MESSAGE_TYPE};
pub use error::{FrameError, Result};
