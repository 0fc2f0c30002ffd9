//! Wire framing (§6.1) and the packet taxonomy (§6.2).
//!
//! Every packet is a 1-byte kind, a 4-byte big-endian length, and `length`
//! payload bytes. `PacketKind` is the closed enumeration of kinds the core
//! understands; anything else is forwarded to callers as `Unknown(u8)` so the
//! parser can skip it without terminating the session.

use std::io::{self, Read, Write};

use bytes::{Bytes, BytesMut};
use common::Size;

/// Header size in bytes: 1 byte kind + 4 byte big-endian length.
pub const HEADER_LEN: usize = 5;

/// Lower bound for the configurable max payload length (§6.1).
pub const MIN_MAX_PAYLOAD_LEN: u32 = 1024 * 1024;

/// Upper bound for the configurable max payload length (§6.1).
pub const MAX_MAX_PAYLOAD_LEN: u32 = 16 * 1024 * 1024;

/// Default max payload length used when a caller does not override it.
pub const DEFAULT_MAX_PAYLOAD_LEN: u32 = 8 * 1024 * 1024;

/// The closed packet-kind enumeration (§6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    VideoConfig,
    Video,
    Audio,
    AudioConfig,
    Dimension,
    /// Reserved range 0x05-0xFF: consume-and-ignore.
    Unknown(u8),
}

impl PacketKind {
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::VideoConfig => 0x00,
            Self::Video => 0x01,
            Self::Audio => 0x02,
            Self::AudioConfig => 0x03,
            Self::Dimension => 0x04,
            Self::Unknown(byte) => byte,
        }
    }

    pub const fn from_u8(byte: u8) -> Self {
        match byte {
            0x00 => Self::VideoConfig,
            0x01 => Self::Video,
            0x02 => Self::Audio,
            0x03 => Self::AudioConfig,
            0x04 => Self::Dimension,
            other => Self::Unknown(other),
        }
    }
}

/// A decoded header: kind plus the payload length that follows it.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub kind: PacketKind,
    pub length: u32,
}

/// Encodes a `Dimension` payload (§6.2): width then height, both u32 BE.
pub fn encode_dimension(size: Size) -> [u8; 8] {
    let mut buf = [0u8; 8];
    buf[0..4].copy_from_slice(&size.width.to_be_bytes());
    buf[4..8].copy_from_slice(&size.height.to_be_bytes());
    buf
}

/// Decodes a `Dimension` payload. The caller guarantees it is exactly 8 bytes.
pub fn decode_dimension(payload: &[u8]) -> Option<Size> {
    if payload.len() != 8 {
        return None;
    }

    let width = u32::from_be_bytes(payload[0..4].try_into().ok()?);
    let height = u32::from_be_bytes(payload[4..8].try_into().ok()?);
    Some(Size::new(width, height))
}

/// Writes one framed packet: header followed by payload.
///
/// Callers are expected to batch several of these between flushes (§4.2's
/// write policy); this function does not flush on its own.
pub fn write_packet<W: Write>(writer: &mut W, kind: PacketKind, payload: &[u8]) -> io::Result<()> {
    debug_assert!(payload.len() <= u32::MAX as usize);

    let mut header = [0u8; HEADER_LEN];
    header[0] = kind.as_u8();
    header[1..5].copy_from_slice(&(payload.len() as u32).to_be_bytes());

    writer.write_all(&header)?;
    writer.write_all(payload)?;
    Ok(())
}

/// Reads one header (kind + length) from `reader`.
///
/// Returns `Ok(None)` on a clean EOF before any header byte is read, and an
/// error for anything short of that (a partial header means the peer closed
/// mid-frame, which is a `TransientI/O` failure per §7).
pub fn read_header<R: Read>(reader: &mut R) -> io::Result<Option<Header>> {
    let mut header = [0u8; HEADER_LEN];

    match read_exact_or_eof(reader, &mut header)? {
        false => return Ok(None),
        true => {}
    }

    let kind = PacketKind::from_u8(header[0]);
    let length = u32::from_be_bytes(header[1..5].try_into().unwrap());
    Ok(Some(Header { kind, length }))
}

/// Reads exactly `length` bytes of payload into a fresh buffer.
pub fn read_payload<R: Read>(reader: &mut R, length: u32) -> io::Result<Bytes> {
    let mut buf = BytesMut::zeroed(length as usize);
    reader.read_exact(&mut buf)?;
    Ok(buf.freeze())
}

/// Like `Read::read_exact`, but reports a clean EOF on the very first byte as
/// `Ok(false)` instead of an error, distinguishing "peer hung up between
/// frames" from "peer hung up mid-frame".
fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed mid-frame",
                ));
            }
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(true)
}
