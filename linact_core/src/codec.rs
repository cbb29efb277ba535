//! Bridge protocol framing.
//!
//! Outbound frames are ASCII lines `can send <id> <hex-payload>\n`. Floats
//! travel as their four little-endian bytes, two lowercase hex digits each.
//! A wire NaN means "leave this axis unchanged"; at this API that is `None`.
//!
//! Replies to `8001` frames carry three float32 registers (position,
//! velocity, torque) at fixed character offsets after an 18-character
//! header (`OK\r\nrcv 100 230301`). The offsets are a contract with the
//! bridge firmware; the buffer length is always checked before slicing.
use std::fmt;

use thiserror::Error;

/// Simple commands (stop, brake, rezero).
pub const SIMPLE_ID: &str = "0001";
/// Write and/or query with a 3-register read-back.
pub const QUERY_ID: &str = "8001";
/// Write without read-back.
pub const WRITE_ONLY_ID: &str = "01";

const STOP_PAYLOAD: &str = "010000";
const BRAKE_PAYLOAD: &str = "01000f";
const REZERO_PREFIX: &str = "0db102";
/// Position/velocity mode, 2-register float32 block at register 0x20.
const WRITE_PREFIX: &str = "01000a0c0220";
/// Read 3 float32 registers starting at 0x01.
const QUERY_SUFFIX: &str = "1c0301";

pub const POSITION_OFFSET: usize = 18;
pub const VELOCITY_OFFSET: usize = 26;
pub const TORQUE_OFFSET: usize = 34;
pub const FIELD_LEN: usize = 8;
/// Shortest reply that holds all three fields.
pub const REPLY_SPAN: usize = TORQUE_OFFSET + FIELD_LEN;

/// One feedback reading from the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuatorSample {
    pub position: f32,
    pub velocity: f32,
    pub torque: f32,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameParseError {
    #[error("reply too short: need {needed} bytes, got {got}")]
    TooShort { needed: usize, got: usize },
    #[error("non-hex character at offset {offset}")]
    InvalidHex { offset: usize },
    #[error("reply contains non-ASCII bytes")]
    NonUtf8,
}

/// One outbound protocol line, newline included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame(String);

impl CommandFrame {
    fn new(id: &str, payload: &str) -> Self {
        Self(format!("can send {id} {payload}\n"))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.trim_end())
    }
}

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Hex-encode `v` as its little-endian bytes.
pub fn encode_f32(v: f32) -> String {
    let mut out = String::with_capacity(FIELD_LEN);
    for b in v.to_le_bytes() {
        out.push(char::from(HEX[usize::from(b >> 4)]));
        out.push(char::from(HEX[usize::from(b & 0x0f)]));
    }
    out
}

/// `None` is "unchanged" and goes out as NaN.
pub fn encode_axis(v: Option<f32>) -> String {
    encode_f32(v.unwrap_or(f32::NAN))
}

pub fn stop() -> CommandFrame {
    CommandFrame::new(SIMPLE_ID, STOP_PAYLOAD)
}

pub fn brake() -> CommandFrame {
    CommandFrame::new(SIMPLE_ID, BRAKE_PAYLOAD)
}

/// Redefine the controller's position origin so the current position reads `position`.
pub fn rezero(position: f32) -> CommandFrame {
    CommandFrame::new(SIMPLE_ID, &format!("{REZERO_PREFIX}{}", encode_f32(position)))
}

pub fn query_only() -> CommandFrame {
    CommandFrame::new(QUERY_ID, QUERY_SUFFIX)
}

pub fn write_and_query(position: Option<f32>, velocity: Option<f32>) -> CommandFrame {
    CommandFrame::new(
        QUERY_ID,
        &format!(
            "{WRITE_PREFIX}{}{}{QUERY_SUFFIX}",
            encode_axis(position),
            encode_axis(velocity)
        ),
    )
}

/// Like `write_and_query` but without read-back; the bridge still acknowledges.
pub fn write_only(position: Option<f32>, velocity: Option<f32>) -> CommandFrame {
    CommandFrame::new(
        WRITE_ONLY_ID,
        &format!(
            "{WRITE_PREFIX}{}{}",
            encode_axis(position),
            encode_axis(velocity)
        ),
    )
}

fn nibble(c: u8, offset: usize) -> Result<u32, FrameParseError> {
    match c {
        b'0'..=b'9' => Ok(u32::from(c - b'0')),
        b'a'..=b'f' => Ok(u32::from(c - b'a' + 10)),
        b'A'..=b'F' => Ok(u32::from(c - b'A' + 10)),
        _ => Err(FrameParseError::InvalidHex { offset }),
    }
}

/// Decode one 8-character field at `offset`. The byte pairs are taken in
/// reverse order (little-endian on the wire) to form the u32 bit pattern.
pub fn decode_field(buf: &[u8], offset: usize) -> Result<f32, FrameParseError> {
    let end = offset + FIELD_LEN;
    let field = buf.get(offset..end).ok_or(FrameParseError::TooShort {
        needed: end,
        got: buf.len(),
    })?;
    if !field.is_ascii() {
        return Err(FrameParseError::NonUtf8);
    }
    let mut bits = 0u32;
    for pair in (0..FIELD_LEN / 2).rev() {
        let i = pair * 2;
        let hi = nibble(field[i], offset + i)?;
        let lo = nibble(field[i + 1], offset + i + 1)?;
        bits = (bits << 8) | (hi << 4) | lo;
    }
    Ok(f32::from_bits(bits))
}

/// Decode a query reply into a sample.
pub fn decode_reply(buf: &[u8]) -> Result<ActuatorSample, FrameParseError> {
    if buf.len() < REPLY_SPAN {
        return Err(FrameParseError::TooShort {
            needed: REPLY_SPAN,
            got: buf.len(),
        });
    }
    Ok(ActuatorSample {
        position: decode_field(buf, POSITION_OFFSET)?,
        velocity: decode_field(buf, VELOCITY_OFFSET)?,
        torque: decode_field(buf, TORQUE_OFFSET)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_encodes_as_little_endian_hex() {
        assert_eq!(encode_f32(1.0), "0000803f");
        assert_eq!(encode_f32(500.0), "0000fa43");
    }

    #[test]
    fn simple_frames() {
        assert_eq!(stop().as_str(), "can send 0001 010000\n");
        assert_eq!(brake().as_str(), "can send 0001 01000f\n");
        assert_eq!(rezero(1.0).as_str(), "can send 0001 0db1020000803f\n");
        assert_eq!(query_only().as_str(), "can send 8001 1c0301\n");
    }

    #[test]
    fn write_only_has_no_suffix() {
        let f = write_only(Some(1.0), Some(0.0));
        assert_eq!(f.as_str(), "can send 01 01000a0c02200000803f00000000\n");
    }

    #[test]
    fn decode_fixed_offsets() {
        let reply = format!(
            "OK\r\nrcv 100 230301{}{}{}\r\n",
            encode_f32(480.5),
            encode_f32(-0.055),
            encode_f32(0.125)
        );
        let s = decode_reply(reply.as_bytes()).unwrap();
        assert_eq!(s.position, 480.5);
        assert_eq!(s.velocity, -0.055);
        assert_eq!(s.torque, 0.125);
    }

    #[test]
    fn short_reply_is_rejected() {
        let err = decode_reply(b"OK\r\n").unwrap_err();
        assert_eq!(err, FrameParseError::TooShort { needed: 42, got: 4 });
    }

    #[test]
    fn non_hex_reports_offset() {
        let reply = format!("OK\r\nrcv 100 230301zz00fa43{}", "0".repeat(16));
        let err = decode_reply(reply.as_bytes()).unwrap_err();
        assert_eq!(err, FrameParseError::InvalidHex { offset: 18 });
    }

    #[test]
    fn non_ascii_is_rejected() {
        let mut reply = format!("OK\r\nrcv 100 230301{}", "0".repeat(24)).into_bytes();
        reply[20] = 0xc3;
        assert_eq!(decode_reply(&reply).unwrap_err(), FrameParseError::NonUtf8);
    }
}
