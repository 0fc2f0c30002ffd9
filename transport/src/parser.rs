//! Stream Parser (§4.4): demultiplexes the framed byte stream into typed
//! packet events and dispatches them synchronously on the calling thread.

use std::io::Read;
use std::sync::atomic::AtomicBool;

use bytes::Bytes;
use common::atomic::EasyAtomic;

use crate::error::Error;
use crate::protocol::{
    self, PacketKind, DEFAULT_MAX_PAYLOAD_LEN, MAX_MAX_PAYLOAD_LEN, MIN_MAX_PAYLOAD_LEN,
};

/// Tunable bound on accepted payload length (§6.1: ≥ 1 MiB, ≤ 16 MiB).
#[derive(Debug, Clone, Copy)]
pub struct ParserConfig {
    pub max_payload_len: u32,
}

impl ParserConfig {
    /// Clamps a caller-supplied bound into §6.1's configurable range,
    /// logging if the requested value was out of bounds.
    pub fn new(max_payload_len: u32) -> Self {
        let clamped = max_payload_len.clamp(MIN_MAX_PAYLOAD_LEN, MAX_MAX_PAYLOAD_LEN);

        if clamped != max_payload_len {
            log::warn!(
                "max_payload_len {max_payload_len} out of range [{MIN_MAX_PAYLOAD_LEN}, {MAX_MAX_PAYLOAD_LEN}], clamped to {clamped}"
            );
        }

        Self {
            max_payload_len: clamped,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_LEN)
    }
}

/// Runs the header/payload read loop until EOF, a fatal framing error, a
/// transient I/O error, or `stop` is set. Unknown kinds are read and
/// discarded rather than terminating the session (§6.2).
///
/// `on_packet` is called synchronously on this thread for every known kind,
/// including `Dimension` — callers decode its payload with
/// `protocol::decode_dimension` rather than the parser interpreting it
/// itself, keeping this loop a plain straight-line read/dispatch.
pub fn run<R: Read>(
    reader: &mut R,
    stop: &AtomicBool,
    config: ParserConfig,
    mut on_packet: impl FnMut(PacketKind, Bytes),
) -> Result<(), Error> {
    loop {
        if stop.get() {
            return Ok(());
        }

        let header = match protocol::read_header(reader)? {
            Some(header) => header,
            None => return Ok(()),
        };

        if header.length > config.max_payload_len {
            return Err(Error::Framing(format!(
                "payload length {} exceeds max {}",
                header.length, config.max_payload_len
            )));
        }

        let payload = protocol::read_payload(reader, header.length)?;

        match header.kind {
            PacketKind::Unknown(byte) => {
                log::debug!(
                    "skipping unknown packet kind 0x{byte:02X} ({} bytes)",
                    payload.len()
                );
            }
            kind => on_packet(kind, payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::write_packet;
    use std::io::Cursor;

    fn collect(bytes: Vec<u8>) -> Result<Vec<(PacketKind, Bytes)>, Error> {
        let mut cursor = Cursor::new(bytes);
        let stop = AtomicBool::new(false);
        let mut seen = Vec::new();
        run(&mut cursor, &stop, ParserConfig::default(), |kind, payload| {
            seen.push((kind, payload));
        })?;
        Ok(seen)
    }

    #[test]
    fn new_clamps_out_of_range_max_payload_len() {
        assert_eq!(ParserConfig::new(0).max_payload_len, MIN_MAX_PAYLOAD_LEN);
        assert_eq!(
            ParserConfig::new(u32::MAX).max_payload_len,
            MAX_MAX_PAYLOAD_LEN
        );
        assert_eq!(
            ParserConfig::new(DEFAULT_MAX_PAYLOAD_LEN).max_payload_len,
            DEFAULT_MAX_PAYLOAD_LEN
        );
    }

    #[test]
    fn unknown_kind_is_skipped_not_fatal() {
        let mut buf = Vec::new();
        write_packet(&mut buf, PacketKind::VideoConfig, &[1, 2, 3, 4]).unwrap();
        write_packet(&mut buf, PacketKind::Unknown(0xEE), &[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        write_packet(
            &mut buf,
            PacketKind::Dimension,
            &protocol::encode_dimension(common::Size::new(1280, 720)),
        )
        .unwrap();

        let seen = collect(buf).unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, PacketKind::VideoConfig);
        assert_eq!(seen[1].0, PacketKind::Dimension);
    }

    #[test]
    fn oversize_length_is_a_fatal_framing_error() {
        let mut buf = Vec::new();
        buf.push(PacketKind::Video.as_u8());
        buf.extend_from_slice(&(DEFAULT_MAX_PAYLOAD_LEN + 1).to_be_bytes());

        let err = collect(buf).unwrap_err();
        assert_eq!(err.kind(), common::error::ErrorKind::Framing);
    }

    #[test]
    fn truncated_stream_is_transient_io() {
        let mut buf = Vec::new();
        write_packet(&mut buf, PacketKind::Video, &[0u8; 4096]).unwrap();
        buf.truncate(protocol::HEADER_LEN + 2048);

        let err = collect(buf).unwrap_err();
        assert_eq!(err.kind(), common::error::ErrorKind::TransientIo);
    }
}
