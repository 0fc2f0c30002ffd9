//! Socket policy shared by the Transport Server and Transport Client
//! (§4.2, §4.3): Nagle disabled on both ends, keepalive and a large send
//! buffer on the producer side to absorb a single-frame burst at peak
//! bitrate.

use std::io;
use std::net::TcpStream;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};

const KEEPALIVE_IDLE: Duration = Duration::from_secs(5);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(2);
const KEEPALIVE_RETRIES: u32 = 3;
const SEND_BUFFER_BYTES: usize = 4 * 1024 * 1024;

/// Applied to the accepted stream on the producer side.
pub fn configure_server_socket(stream: &TcpStream) -> io::Result<()> {
    stream.set_nodelay(true)?;

    let socket = SockRef::from(stream);
    socket.set_keepalive(true)?;
    socket.set_tcp_keepalive(
        &TcpKeepalive::new()
            .with_time(KEEPALIVE_IDLE)
            .with_interval(KEEPALIVE_INTERVAL)
            .with_retries(KEEPALIVE_RETRIES),
    )?;
    socket.set_send_buffer_size(SEND_BUFFER_BYTES)?;

    Ok(())
}

/// Applied to the connected stream on the consumer side.
pub fn configure_client_socket(stream: &TcpStream) -> io::Result<()> {
    stream.set_nodelay(true)?;
    Ok(())
}
