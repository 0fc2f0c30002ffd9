//! Transport Client (§4.3): connects to a producer endpoint, owns the
//! receive pipeline, and hands framed packets to the Stream Parser.

use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bytes::Bytes;
use common::atomic::EasyAtomic;
use parking_lot::Mutex;

use crate::error::Error;
use crate::parser::{self, ParserConfig};
use crate::protocol::PacketKind;
use crate::socket::configure_client_socket;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    Connecting,
    Receiving,
    Disconnected,
}

/// Owns the consumer side of one TCP session. `run` is blocking and is
/// intended to be driven from a dedicated reader thread (§5).
pub struct TransportClient {
    state: Mutex<ClientState>,
    last_error: Mutex<Option<String>>,
    stop: Arc<AtomicBool>,
    parser_config: ParserConfig,
}

impl TransportClient {
    pub fn new(parser_config: ParserConfig) -> Self {
        Self {
            state: Mutex::new(ClientState::Idle),
            last_error: Mutex::new(None),
            stop: Arc::new(AtomicBool::new(false)),
            parser_config,
        }
    }

    pub fn state(&self) -> ClientState {
        *self.state.lock()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// Connects to `addr`, resets decoders via `on_receiving` before any
    /// bytes are read, then runs the parser loop, dispatching known packets
    /// to `on_packet` until EOF, a fatal error, or `disconnect()`.
    pub fn run(
        &self,
        addr: SocketAddr,
        on_receiving: impl FnOnce(),
        on_packet: impl FnMut(PacketKind, Bytes),
    ) -> Result<(), Error> {
        *self.state.lock() = ClientState::Connecting;

        let mut stream = match TcpStream::connect(addr).and_then(|stream| {
            configure_client_socket(&stream)?;
            Ok(stream)
        }) {
            Ok(stream) => stream,
            Err(err) => {
                let err = Error::TransientIo(err);
                *self.last_error.lock() = Some(err.to_string());
                *self.state.lock() = ClientState::Disconnected;
                return Err(err);
            }
        };

        on_receiving();
        *self.state.lock() = ClientState::Receiving;

        let result = parser::run(&mut stream, &self.stop, self.parser_config, on_packet);

        *self.state.lock() = ClientState::Disconnected;

        if let Err(ref err) = result {
            *self.last_error.lock() = Some(err.to_string());
        }

        result
    }

    /// Cancels the reader loop; idempotent, safe from any thread.
    pub fn disconnect(&self) {
        self.stop.set(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::write_packet;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn receiving_resets_decoders_before_reading_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            write_packet(&mut stream, PacketKind::VideoConfig, &[1, 2, 3, 4]).unwrap();
        });

        let client = TransportClient::new(ParserConfig::default());
        let reset_called = Arc::new(AtomicBool::new(false));
        let reset_called_clone = reset_called.clone();

        let mut seen = Vec::new();
        let result = client.run(
            addr,
            move || reset_called_clone.set(true),
            |kind, payload| seen.push((kind, payload)),
        );

        server.join().unwrap();
        assert!(result.is_ok());
        assert!(reset_called.get());
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, PacketKind::VideoConfig);
        assert_eq!(client.state(), ClientState::Disconnected);
    }

    #[test]
    fn connect_failure_surfaces_last_error() {
        let client = TransportClient::new(ParserConfig::default());
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let result = client.run(addr, || {}, |_, _| {});
        assert!(result.is_err());
        assert!(client.last_error().is_some());
    }
}
