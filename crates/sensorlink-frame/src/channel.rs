//! Channel identifiers.
//!
//! A channel id is an opaque key naming one logical conversation. The
//! transport only compares ids for equality and copies them into frame
//! headers, so any small fixed-width value can serve.

use std::fmt;

use bytes::{Buf, BufMut};

/// A fixed-width, equality-comparable conversation key.
///
/// `put` must write exactly `WIRE_SIZE` bytes and `get` must read exactly
/// `WIRE_SIZE` bytes; the decoder checks the length before calling `get`.
pub trait ChannelId: Copy + Eq + fmt::Debug {
    /// Encoded size in bytes.
    const WIRE_SIZE: usize;

    fn put(&self, dst: &mut impl BufMut);

    fn get(src: &mut impl Buf) -> Self;
}

impl ChannelId for u8 {
    const WIRE_SIZE: usize = 1;

    fn put(&self, dst: &mut impl BufMut) {
        dst.put_u8(*self);
    }

    fn get(src: &mut impl Buf) -> Self {
        src.get_u8()
    }
}

impl ChannelId for u16 {
    const WIRE_SIZE: usize = 2;

    fn put(&self, dst: &mut impl BufMut) {
        dst.put_u16_le(*self);
    }

    fn get(src: &mut impl Buf) -> Self {
        src.get_u16_le()
    }
}

impl ChannelId for u32 {
    const WIRE_SIZE: usize = 4;

    fn put(&self, dst: &mut impl BufMut) {
        dst.put_u32_le(*self);
    }

    fn get(src: &mut impl Buf) -> Self {
        src.get_u32_le()
    }
}

/// Two-part channel id: a rule (query, subsystem) and a value within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RuleChannel {
    pub rule: u8,
    pub value: u8,
}

impl RuleChannel {
    pub const fn new(rule: u8, value: u8) -> Self {
        Self { rule, value }
    }
}

impl fmt::Display for RuleChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}.{:x}", self.rule, self.value)
    }
}

impl From<(u8, u8)> for RuleChannel {
    fn from((rule, value): (u8, u8)) -> Self {
        Self { rule, value }
    }
}

impl ChannelId for RuleChannel {
    const WIRE_SIZE: usize = 2;

    fn put(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.rule);
        dst.put_u8(self.value);
    }

    fn get(src: &mut impl Buf) -> Self {
        let rule = src.get_u8();
        let value = src.get_u8();
        Self { rule, value }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    fn encoded<C: ChannelId>(id: C) -> Vec<u8> {
        let mut buf = BytesMut::new();
        id.put(&mut buf);
        assert_eq!(buf.len(), C::WIRE_SIZE);
        buf.to_vec()
    }

    #[test]
    fn integer_ids_are_little_endian() {
        assert_eq!(encoded(0x12u8), vec![0x12]);
        assert_eq!(encoded(0x1234u16), vec![0x34, 0x12]);
        assert_eq!(encoded(0x1234_5678u32), vec![0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn rule_channel_is_rule_then_value() {
        let id = RuleChannel::new(1, 2);
        assert_eq!(encoded(id), vec![1, 2]);

        let mut src: &[u8] = &[1, 2, 0xff];
        assert_eq!(RuleChannel::get(&mut src), id);
        assert_eq!(src, &[0xff]);
    }

    #[test]
    fn rule_channel_display() {
        assert_eq!(RuleChannel::from((0x1a, 2)).to_string(), "1a.2");
    }
}
