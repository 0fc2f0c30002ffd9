//! Framed A/V transport: the wire protocol, the producer-side packet
//! multiplexer, the Transport Server/Client state machines, and the
//! consumer-side stream parser.

pub mod client;
pub mod error;
pub mod multiplexer;
pub mod parser;
pub mod protocol;
pub mod server;
pub mod socket;

pub use client::{ClientState, TransportClient};
pub use error::Error;
pub use multiplexer::{Multiplexer, Submission};
pub use parser::ParserConfig;
pub use protocol::{Header, PacketKind};
pub use server::{ServerState, TransportServer};
