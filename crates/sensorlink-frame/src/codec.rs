use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use bytes::{Buf, BufMut, BytesMut};

use crate::channel::ChannelId;
use crate::error::{FrameError, Result};

/// Protocol type tag carried in the first header byte.
pub const MESSAGE_TYPE: u8 = 0x52;

/// Header bytes preceding the channel id: type (1) + flags (1) + sequence (2).
pub const FIXED_HEADER_SIZE: usize = 4;

/// Full header size for frames keyed by `C`.
pub const fn header_size<C: ChannelId>() -> usize {
    FIXED_HEADER_SIZE + C::WIRE_SIZE
}

/// Frame flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u8);

impl Flags {
    /// Sent by the initiating end of a channel.
    pub const INITIATOR: Flags = Flags(0x01);
    /// Opens (or re-opens) the channel.
    pub const OPEN: Flags = Flags(0x02);
    /// Closes the channel.
    pub const CLOSE: Flags = Flags(0x04);
    /// Acknowledges the frame with the same channel and sequence number.
    pub const ACK: Flags = Flags(0x08);

    pub const fn empty() -> Self {
        Flags(0)
    }

    /// Unknown bits are kept as-is.
    pub const fn from_bits(bits: u8) -> Self {
        Flags(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Flags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Flags) {
        self.0 &= !other.0;
    }

    pub fn set(&mut self, other: Flags, on: bool) {
        if on {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Flags, &str); 4] = [
            (Flags::INITIATOR, "INITIATOR"),
            (Flags::OPEN, "OPEN"),
            (Flags::CLOSE, "CLOSE"),
            (Flags::ACK, "ACK"),
        ];
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        let unknown = self.0 & !0x0f;
        if unknown != 0 {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{unknown:#04x}")?;
            first = false;
        }
        if first {
            f.write_str("-")?;
        }
        Ok(())
    }
}

/// A reliable-transport frame.
///
/// The payload is bounded by `max_payload`, normally the radio's maximum
/// frame length minus [`header_size`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<C> {
    kind: u8,
    flags: Flags,
    sequence: u16,
    channel: C,
    payload: BytesMut,
    max_payload: usize,
}

impl<C: ChannelId> Frame<C> {
    /// Create a frame with an empty payload and no payload limit.
    pub fn new(kind: u8, channel: C, sequence: u16, flags: Flags) -> Self {
        Self {
            kind,
            flags,
            sequence,
            channel,
            payload: BytesMut::new(),
            max_payload: usize::MAX,
        }
    }

    /// Bound the payload to `max_payload` bytes.
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self.payload.reserve(max_payload.min(256));
        self
    }

    pub fn kind(&self) -> u8 {
        self.kind
    }

    pub fn channel(&self) -> C {
        self.channel
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn initiator(&self) -> bool {
        self.flags.contains(Flags::INITIATOR)
    }

    pub fn is_open(&self) -> bool {
        self.flags.contains(Flags::OPEN)
    }

    pub fn is_close(&self) -> bool {
        self.flags.contains(Flags::CLOSE)
    }

    pub fn is_ack(&self) -> bool {
        self.flags.contains(Flags::ACK)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Payload bytes that can still be appended.
    pub fn remaining(&self) -> usize {
        self.max_payload.saturating_sub(self.payload.len())
    }

    /// Total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        header_size::<C>() + self.payload.len()
    }

    pub fn set_kind(&mut self, kind: u8) {
        self.kind = kind;
    }

    pub fn set_channel(&mut self, channel: C) {
        self.channel = channel;
    }

    pub fn set_sequence(&mut self, sequence: u16) {
        self.sequence = sequence;
    }

    pub fn set_flags(&mut self, flags: Flags) {
        self.flags = flags;
    }

    /// Replace the payload.
    pub fn set_payload(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload,
            });
        }
        self.payload.clear();
        self.payload.extend_from_slice(payload);
        Ok(())
    }

    /// Append to the payload.
    pub fn append_payload(&mut self, data: &[u8]) -> Result<()> {
        let size = self.payload.len() + data.len();
        if size > self.max_payload {
            return Err(FrameError::PayloadTooLarge {
                size,
                max: self.max_payload,
            });
        }
        self.payload.extend_from_slice(data);
        Ok(())
    }

    pub fn clear_payload(&mut self) {
        self.payload.clear();
    }

    /// The acknowledgment for this frame: same kind, channel, sequence and
    /// flags plus ACK, with an empty payload.
    pub fn ack(&self) -> Self {
        Self {
            kind: self.kind,
            flags: self.flags | Flags::ACK,
            sequence: self.sequence,
            channel: self.channel,
            payload: BytesMut::new(),
            max_payload: self.max_payload,
        }
    }

    /// Encode into the wire format.
    ///
    /// Wire format:
    /// ```text
    /// ┌────────┬────────┬──────────────┬───────────────┬───────────────┐
    /// │ Type   │ Flags  │ Sequence     │ Channel       │ Payload       │
    /// │ (1B)   │ (1B)   │ (2B LE)      │ (C::WIRE_SIZE)│ (rest)        │
    /// └────────┴────────┴──────────────┴───────────────┴───────────────┘
    /// ```
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.wire_size());
        dst.put_u8(self.kind);
        dst.put_u8(self.flags.bits());
        dst.put_u16_le(self.sequence);
        self.channel.put(dst);
        dst.put_slice(&self.payload);
    }

    /// Decode one frame occupying all of `src`.
    pub fn decode(src: &[u8], max_payload: usize) -> Result<Self> {
        let needed = header_size::<C>();
        if src.len() < needed {
            return Err(FrameError::Truncated {
                len: src.len(),
                needed,
            });
        }
        if src.len() - needed > max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: src.len() - needed,
                max: max_payload,
            });
        }

        let mut buf = src;
        let kind = buf.get_u8();
        let flags = Flags::from_bits(buf.get_u8());
        let sequence = buf.get_u16_le();
        let channel = C::get(&mut buf);

        Ok(Self {
            kind,
            flags,
            sequence,
            channel,
            payload: BytesMut::from(buf),
            max_payload,
        })
    }
}

/// Protocol type tag of an encoded frame, without decoding the rest.
pub fn peek_kind(src: &[u8]) -> Option<u8> {
    src.first().copied()
}
