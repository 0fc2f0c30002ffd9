//! Transport Server (§4.2): owns the listening endpoint, accepts one
//! consumer session at a time, replays caches on accept, and drains the
//! Multiplexer onto the wire.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::atomic::EasyAtomic;
use parking_lot::Mutex;

use crate::error::Error;
use crate::multiplexer::Multiplexer;
use crate::protocol::write_packet;
use crate::socket::configure_server_socket;

/// Short poll interval for the accept loop and the writer's idle wait, so
/// shutdown is noticed promptly without busy-spinning (§5).
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to wait after a client connects before warning that no key
/// frame has ever been cached (§9's open question on a silent encoder).
const KEY_FRAME_DIAGNOSTIC_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Listening,
    Serving,
    Stopped,
}

/// Owns the listening socket and runs the accept/drain loop. Intended to be
/// driven from its own thread via `serve`; `shutdown` is safe to call from
/// any thread and is idempotent.
pub struct TransportServer {
    multiplexer: Arc<Multiplexer>,
    state: Mutex<ServerState>,
    listener: Mutex<Option<TcpListener>>,
    stop: Arc<AtomicBool>,
    last_error: Mutex<Option<String>>,
}

impl TransportServer {
    pub fn new(multiplexer: Arc<Multiplexer>) -> Self {
        Self {
            multiplexer,
            state: Mutex::new(ServerState::Idle),
            listener: Mutex::new(None),
            stop: Arc::new(AtomicBool::new(false)),
            last_error: Mutex::new(None),
        }
    }

    /// Binds the listening socket, transitioning Idle -> Listening.
    pub fn listen(&self, addr: SocketAddr) -> Result<SocketAddr, Error> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        *self.listener.lock() = Some(listener);
        *self.state.lock() = ServerState::Listening;

        Ok(local_addr)
    }

    pub fn state(&self) -> ServerState {
        *self.state.lock()
    }

    /// Set when `shutdown_with_error` tore the session down for a reason an
    /// observer should see, e.g. a reported permission loss (§7).
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// Runs the accept loop on the calling thread until `shutdown` is
    /// called. `on_client_connected` is the §4.5 hook that lets the encoder
    /// façade request an immediate key frame; it fires after the cached
    /// replay is written and before the fresh Dimension update.
    pub fn serve(&self, on_client_connected: impl Fn() + Send + Sync) -> Result<(), Error> {
        let listener = {
            let guard = self.listener.lock();
            let listener = guard.as_ref().ok_or_else(|| {
                Error::Framing("serve called before listen".to_string())
            })?;
            listener.try_clone()?
        };

        loop {
            if self.stop.get() {
                *self.state.lock() = ServerState::Stopped;
                return Ok(());
            }

            match listener.accept() {
                Ok((stream, peer)) => {
                    log::info!("accepted consumer session from {peer}");
                    *self.state.lock() = ServerState::Serving;

                    if let Err(err) = self.serve_session(stream, &on_client_connected) {
                        log::warn!("session ended: {err}");
                    }

                    self.multiplexer.reset_session();

                    if self.stop.get() {
                        *self.state.lock() = ServerState::Stopped;
                        return Ok(());
                    }

                    *self.state.lock() = ServerState::Listening;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(Error::TransientIo(e)),
            }
        }
    }

    fn serve_session(
        &self,
        mut stream: TcpStream,
        on_client_connected: &(impl Fn() + Send + Sync),
    ) -> Result<(), Error> {
        configure_server_socket(&stream)?;

        for (kind, payload) in self.multiplexer.accept_replay() {
            write_packet(&mut stream, kind, &payload)?;
        }

        on_client_connected();

        let connected_at = Instant::now();
        let mut warned_no_key_frame = false;

        loop {
            if self.stop.get() {
                return Ok(());
            }

            let batch = self.multiplexer.drain();
            if batch.is_empty() {
                if !warned_no_key_frame
                    && !self.multiplexer.has_key_frame()
                    && connected_at.elapsed() > KEY_FRAME_DIAGNOSTIC_WINDOW
                {
                    log::warn!(
                        "no key frame cached {:?} after client connected; encoder façade may not be responding to the key-frame request",
                        connected_at.elapsed()
                    );
                    warned_no_key_frame = true;
                }

                thread::sleep(POLL_INTERVAL);
                continue;
            }

            for (kind, payload) in batch {
                write_packet(&mut stream, kind, &payload)?;
            }
        }
    }

    /// Cancels the accept loop and the writer; idempotent.
    pub fn shutdown(&self) {
        self.stop.set(true);
    }

    /// Like `shutdown`, but records the cause first so `last_error` can
    /// report why the service stopped (§7, e.g. a reported permission loss).
    pub fn shutdown_with_error(&self, err: Error) {
        *self.last_error.lock() = Some(err.to_string());
        self.stop.set(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiplexer::Submission;
    use crate::protocol::{read_header, read_payload, PacketKind};
    use bytes::Bytes;
    use std::io::Read as _;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn accept_replays_caches_in_order() {
        let multiplexer = Arc::new(Multiplexer::default());
        multiplexer.submit(Submission::VideoConfig(Bytes::from_static(&[0x67, 0x42, 0x00, 0x1E])));
        multiplexer.submit(Submission::AudioConfig(Bytes::from_static(&[0x11, 0x90])));
        multiplexer.submit(Submission::Video {
            payload: Bytes::from(vec![0x65u8; 768]),
            is_key: true,
        });
        multiplexer.submit(Submission::Dimension(common::Size::new(1280, 720)));

        let server = Arc::new(TransportServer::new(multiplexer));
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let bound = server.listen(addr).unwrap();

        let connect_count = Arc::new(AtomicUsize::new(0));
        let server_clone = server.clone();
        let connect_count_clone = connect_count.clone();
        let handle = thread::spawn(move || {
            server_clone
                .serve(move || {
                    connect_count_clone.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        });

        let mut client = TcpStream::connect(bound).unwrap();

        let header = read_header(&mut client).unwrap().unwrap();
        assert_eq!(header.kind, PacketKind::VideoConfig);
        let _ = read_payload(&mut client, header.length).unwrap();

        let header = read_header(&mut client).unwrap().unwrap();
        assert_eq!(header.kind, PacketKind::AudioConfig);
        let _ = read_payload(&mut client, header.length).unwrap();

        let header = read_header(&mut client).unwrap().unwrap();
        assert_eq!(header.kind, PacketKind::Video);
        let _ = read_payload(&mut client, header.length).unwrap();

        let header = read_header(&mut client).unwrap().unwrap();
        assert_eq!(header.kind, PacketKind::Dimension);
        let payload = read_payload(&mut client, header.length).unwrap();
        assert_eq!(
            &payload[..],
            &crate::protocol::encode_dimension(common::Size::new(1280, 720))
        );

        server.shutdown();
        drop(client);
        handle.join().unwrap();
        assert_eq!(connect_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn write_error_returns_server_to_listening() {
        let multiplexer = Arc::new(Multiplexer::default());
        let server = Arc::new(TransportServer::new(multiplexer.clone()));
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let bound = server.listen(addr).unwrap();

        let server_clone = server.clone();
        let handle = thread::spawn(move || {
            server_clone.serve(|| {}).unwrap();
        });

        {
            let client = TcpStream::connect(bound).unwrap();
            drop(client);
        }

        // Give the accept loop a moment to notice the new connection, then
        // push a frame so the writer's next drain actually attempts a write
        // against the now-closed socket.
        thread::sleep(Duration::from_millis(100));
        multiplexer.submit(Submission::Audio(Bytes::from_static(&[0u8; 4])));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(server.state(), ServerState::Listening);

        server.shutdown();
        let _ = TcpStream::connect(bound); // unblock accept poll promptly
        handle.join().unwrap();
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[test]
    fn shutdown_with_error_is_visible_before_stop_observed() {
        let multiplexer = Arc::new(Multiplexer::default());
        let server = TransportServer::new(multiplexer);
        assert!(server.last_error().is_none());

        server.shutdown_with_error(Error::PermissionLoss("capture permission revoked".to_string()));

        assert!(server.stop.get());
        assert_eq!(
            server.last_error().as_deref(),
            Some("permission loss: capture permission revoked")
        );
    }

    #[allow(dead_code)]
    fn drain_all(stream: &mut TcpStream) {
        let mut buf = [0u8; 1024];
        let _ = stream.read(&mut buf);
    }
}
