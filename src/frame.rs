//! Provides a type representing a protocol frame as well as utilities
//! for decoding frames from a byte slice and encoding them back.

use bytes::Bytes;
use thiserror::Error;

/// Nested arrays beyond this depth are rejected rather than decoded
/// recursively, so a hostile frame cannot exhaust the stack.
const MAX_ARRAY_DEPTH: usize = 32;

const SIMPLE_STRING_TAG: u8 = b'+';
const SIMPLE_ERROR_TAG: u8 = b'-';
const INTEGER_TAG: u8 = b':';
const BULK_STRING_TAG: u8 = b'$';
const ARRAY_TAG: u8 = b'*';

/// A frame in the wire protocol.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Null,
    Array(Vec<Frame>),
}

/// Why a buffer failed to decode.
///
/// None of these reach the client; the connection that produced the
/// bytes is closed instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The buffer ends before the frame does.
    #[error("truncated frame")]
    Incomplete,

    /// The leading tag byte names no known datatype.
    #[error("unknown datatype tag `{0:#04x}`")]
    UnknownDatatype(u8),

    /// Structurally invalid frame.
    #[error("malformed frame: {0}")]
    Malformed(&'static str),
}

impl Frame {
    /// Decodes exactly one top-level frame from `src`.
    pub fn decode(src: &[u8]) -> Result<Frame, FrameError> {
        if src.is_empty() {
            return Err(FrameError::Incomplete);
        }
        let (frame, _) = Frame::decode_one(src, 0)?;
        Ok(frame)
    }

    /// Decodes a single frame starting at `offset`, returning the
    /// frame and the offset of the first byte after it. Arrays decode
    /// their elements recursively, so a caller can walk a buffer of
    /// concatenated frames by feeding the returned offset back in.
    pub fn decode_one(src: &[u8], offset: usize) -> Result<(Frame, usize), FrameError> {
        decode_at(src, offset, 0)
    }

    /// Encodes the frame into its wire representation.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Frame::Simple(val) => {
                buf.push(SIMPLE_STRING_TAG);
                buf.extend_from_slice(val.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Frame::Error(val) => {
                buf.push(SIMPLE_ERROR_TAG);
                buf.extend_from_slice(val.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Frame::Integer(val) => {
                buf.push(INTEGER_TAG);
                buf.extend_from_slice(val.to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Frame::Bulk(val) => {
                buf.push(BULK_STRING_TAG);
                buf.extend_from_slice(val.len().to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
                buf.extend_from_slice(val);
                buf.extend_from_slice(b"\r\n");
            }
            Frame::Null => {
                buf.extend_from_slice(b"$-1\r\n");
            }
            Frame::Array(items) => {
                buf.push(ARRAY_TAG);
                buf.extend_from_slice(items.len().to_string().as_bytes());
                buf.extend_from_slice(b"\r\n");
                for item in items {
                    item.encode_into(buf);
                }
            }
        }
    }
}

fn decode_at(src: &[u8], offset: usize, depth: usize) -> Result<(Frame, usize), FrameError> {
    let tag = *src.get(offset).ok_or(FrameError::Incomplete)?;

    match tag {
        SIMPLE_STRING_TAG => {
            let (line, next) = take_line(src, offset + 1)?;
            Ok((Frame::Simple(line_to_string(line)?), next))
        }
        SIMPLE_ERROR_TAG => {
            let (line, next) = take_line(src, offset + 1)?;
            Ok((Frame::Error(line_to_string(line)?), next))
        }
        INTEGER_TAG => {
            let (line, next) = take_line(src, offset + 1)?;
            Ok((Frame::Integer(parse_signed(line)?), next))
        }
        BULK_STRING_TAG => {
            let (line, next) = take_line(src, offset + 1)?;
            if line == b"-1" {
                return Ok((Frame::Null, next));
            }
            let len = parse_unsigned(line)?;
            let end = next.checked_add(len).ok_or(FrameError::Malformed(
                "bulk string length out of range",
            ))?;
            if end + 2 > src.len() {
                return Err(FrameError::Incomplete);
            }
            if &src[end..end + 2] != b"\r\n" {
                return Err(FrameError::Malformed("bulk string missing terminator"));
            }
            let data = Bytes::copy_from_slice(&src[next..end]);
            Ok((Frame::Bulk(data), end + 2))
        }
        ARRAY_TAG => {
            if depth >= MAX_ARRAY_DEPTH {
                return Err(FrameError::Malformed("array nesting too deep"));
            }
            let (line, mut next) = take_line(src, offset + 1)?;
            let count = parse_unsigned(line)?;
            let mut items = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                let (item, after) = decode_at(src, next, depth + 1)?;
                items.push(item);
                next = after;
            }
            Ok((Frame::Array(items), next))
        }
        other => Err(FrameError::UnknownDatatype(other)),
    }
}

/// Returns the line starting at `offset` (without its CRLF) and the
/// offset just past the terminator.
fn take_line(src: &[u8], offset: usize) -> Result<(&[u8], usize), FrameError> {
    if offset > src.len() {
        return Err(FrameError::Incomplete);
    }
    let mut idx = offset;
    while idx + 1 < src.len() {
        if src[idx] == b'\r' {
            if src[idx + 1] != b'\n' {
                return Err(FrameError::Malformed("line missing LF after CR"));
            }
            return Ok((&src[offset..idx], idx + 2));
        }
        idx += 1;
    }
    Err(FrameError::Incomplete)
}

fn line_to_string(line: &[u8]) -> Result<String, FrameError> {
    String::from_utf8(line.to_vec()).map_err(|_| FrameError::Malformed("invalid utf-8 text"))
}

/// Parses an unsigned length prefix digit by digit.
fn parse_unsigned(line: &[u8]) -> Result<usize, FrameError> {
    if line.is_empty() {
        return Err(FrameError::Malformed("empty length prefix"));
    }
    let mut value: usize = 0;
    for &byte in line {
        if !byte.is_ascii_digit() {
            return Err(FrameError::Malformed("length prefix is not an integer"));
        }
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add((byte - b'0') as usize))
            .ok_or(FrameError::Malformed("length prefix out of range"))?;
    }
    Ok(value)
}

/// Parses a signed 64-bit integer; an explicit leading `+` or `-` is
/// accepted.
fn parse_signed(line: &[u8]) -> Result<i64, FrameError> {
    let (negative, digits) = match line.first() {
        Some(b'+') => (false, &line[1..]),
        Some(b'-') => (true, &line[1..]),
        _ => (false, line),
    };
    if digits.is_empty() {
        return Err(FrameError::Malformed("empty integer"));
    }
    let mut value: i64 = 0;
    for &byte in digits {
        if !byte.is_ascii_digit() {
            return Err(FrameError::Malformed("integer contains non-digits"));
        }
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add((byte - b'0') as i64))
            .ok_or(FrameError::Malformed("integer out of range"))?;
    }
    Ok(if negative { -value } else { value })
}
