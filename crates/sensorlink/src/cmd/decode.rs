use sensorlink_frame::{header_size, Frame, MESSAGE_TYPE};
use serde::Serialize;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{payload_preview, print_fields, print_json, OutputFormat};

#[derive(Serialize, Debug, PartialEq, Eq)]
struct DecodeOutput {
    message_type: u8,
    sensorlink: bool,
    flags: String,
    initiator: bool,
    open: bool,
    close: bool,
    ack: bool,
    sequence: u16,
    channel: u16,
    header_size: usize,
    payload_size: usize,
    payload: String,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex)?;
    let out = decode(&bytes)?;

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_fields(&[
            ("type", format!("{:#04x}", out.message_type)),
            ("sensorlink", out.sensorlink.to_string()),
            ("flags", out.flags.clone()),
            ("sequence", out.sequence.to_string()),
            ("channel", out.channel.to_string()),
            ("payload_size", out.payload_size.to_string()),
            ("payload", out.payload.clone()),
        ]),
        OutputFormat::Pretty => println!(
            "type={:#04x} flags={} seq={} channel={} size={} payload={}",
            out.message_type, out.flags, out.sequence, out.channel, out.payload_size, out.payload
        ),
    }
    Ok(SUCCESS)
}

fn decode(bytes: &[u8]) -> CliResult<DecodeOutput> {
    let frame = Frame::<u16>::decode(bytes, usize::MAX).map_err(|e| frame_error("decode", e))?;
    Ok(DecodeOutput {
        message_type: frame.kind(),
        sensorlink: frame.kind() == MESSAGE_TYPE,
        flags: frame.flags().to_string(),
        initiator: frame.initiator(),
        open: frame.is_open(),
        close: frame.is_close(),
        ack: frame.is_ack(),
        sequence: frame.sequence(),
        channel: frame.channel(),
        header_size: header_size::<u16>(),
        payload_size: frame.payload_len(),
        payload: payload_preview(frame.payload()),
    })
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            DATA_INVALID,
            "hex input has an odd number of digits",
        ));
    }
    digits
        .chunks(2)
        .map(|pair| match (hex_value(pair[0]), hex_value(pair[1])) {
            (Some(hi), Some(lo)) => Ok((hi << 4) | lo),
            _ => Err(CliError::new(
                DATA_INVALID,
                format!("invalid hex digit in '{}'", String::from_utf8_lossy(pair)),
            )),
        })
        .collect()
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_separated_hex() {
        assert_eq!(parse_hex("52:0a 01 00").unwrap(), vec![0x52, 0x0a, 0x01, 0x00]);
        assert_eq!(parse_hex("ABcd").unwrap(), vec![0xab, 0xcd]);
    }

    #[test]
    fn rejects_bad_hex() {
        assert_eq!(parse_hex("520").unwrap_err().code, DATA_INVALID);
        assert_eq!(parse_hex("zz").unwrap_err().code, DATA_INVALID);
    }

    #[test]
    fn decodes_ack_header() {
        let out = decode(&[0x52, 0x09, 0x03, 0x00, 0x07, 0x00]).unwrap();
        assert!(out.sensorlink);
        assert_eq!(out.flags, "INITIATOR|ACK");
        assert!(out.ack);
        assert_eq!(out.sequence, 3);
        assert_eq!(out.channel, 7);
        assert_eq!(out.payload_size, 0);
    }

    #[test]
    fn decodes_payload() {
        let out = decode(&[0x52, 0x01, 0x01, 0x00, 0x02, 0x00, b'h', b'i']).unwrap();
        assert_eq!(out.payload, "hi");
        assert!(!out.ack);
    }

    #[test]
    fn truncated_frame_is_data_invalid() {
        let err = decode(&[0x52, 0x01]).unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
    }
}
