use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use common::logger::{enable_panic_logger, init_logger};
use log::LevelFilter;
use mimalloc::MiMalloc;
use screenreflect::{
    AudioDecoderFacade, AudioEncoderFacade, Consumer, ConsumerOptions, DimensionObserver,
    Endpoint, Producer, ProducerOptions, VideoDecoderFacade, VideoEncoderFacade,
};
use transport::ClientState;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "screenreflect", about = "Low-latency screen mirroring transport")]
struct Cli {
    /// Increase logging verbosity; repeat for more (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Load options from a JSON file instead of the subcommand's flags.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a producer: bind a listener, advertise it, and wait for one
    /// consumer session. Real capture/encoder façades are out of scope for
    /// this binary; it wires the transport core to logging stand-ins so the
    /// pipeline can be exercised end-to-end manually.
    Serve {
        #[arg(long, default_value = "0.0.0.0:0")]
        bind: SocketAddr,

        #[arg(long, default_value_t = true)]
        advertise: bool,
    },
    /// Run a consumer: connect (directly or via discovery) and log the
    /// packets it receives.
    Connect {
        /// Connect directly instead of browsing mDNS.
        #[arg(long)]
        addr: Option<SocketAddr>,

        #[arg(long, default_value_t = 5)]
        discover_timeout_secs: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    if let Err(err) = init_logger(level, None) {
        eprintln!("failed to initialize logger: {err}");
    }

    enable_panic_logger();

    let config = cli.config;

    let result = match cli.command {
        Command::Serve { bind, advertise } => serve(bind, advertise, config.as_deref()),
        Command::Connect {
            addr,
            discover_timeout_secs,
        } => connect(addr, discover_timeout_secs, config.as_deref()),
    };

    if let Err(err) = result {
        log::error!("{err}");
        std::process::exit(1);
    }
}

/// Reads and parses a JSON options file. Mirrors the donor workspace's own
/// settings-file convention (`serde_json::from_slice` over a `read` of a flat
/// file), just generalized to whichever options type the caller wants.
fn load_options<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> std::io::Result<T> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
}

fn serve(
    bind: SocketAddr,
    advertise: bool,
    config: Option<&std::path::Path>,
) -> Result<(), screenreflect::Error> {
    let options = match config {
        Some(path) => load_options(path)?,
        None => ProducerOptions {
            bind,
            advertise,
            ..ProducerOptions::default()
        },
    };

    let producer = Producer::start(options, Arc::new(LoggingEncoder), Arc::new(LoggingEncoder))?;

    log::info!("listening on {}", producer.local_addr());

    loop {
        std::thread::sleep(Duration::from_secs(60));
        log::debug!("producer state: {:?}", producer.state());
    }
}

fn connect(
    addr: Option<SocketAddr>,
    discover_timeout_secs: u64,
    config: Option<&std::path::Path>,
) -> Result<(), screenreflect::Error> {
    let options = match config {
        Some(path) => load_options(path)?,
        None => {
            let endpoint = match addr {
                Some(addr) => Endpoint::Direct(addr),
                None => Endpoint::Discover {
                    timeout: Duration::from_secs(discover_timeout_secs),
                },
            };

            ConsumerOptions {
                endpoint,
                ..ConsumerOptions::default()
            }
        }
    };

    let consumer = Consumer::connect(
        options,
        Arc::new(LoggingDecoder("video")),
        Arc::new(LoggingDecoder("audio")),
        Arc::new(LoggingDimensionObserver),
    )?;

    loop {
        std::thread::sleep(Duration::from_secs(1));

        if consumer.state() == ClientState::Disconnected {
            if let Some(err) = consumer.last_error() {
                log::error!("disconnected: {err}");
            }

            return Ok(());
        }
    }
}

struct LoggingEncoder;

impl VideoEncoderFacade for LoggingEncoder {
    fn request_key_frame(&self) {
        log::info!("encoder asked to produce a key frame");
    }
}

impl AudioEncoderFacade for LoggingEncoder {}

struct LoggingDecoder(&'static str);

impl VideoDecoderFacade for LoggingDecoder {
    fn reset(&self) {
        log::debug!("{} decoder reset", self.0);
    }

    fn decode(&self, payload: bytes::Bytes) {
        log::debug!("{} decode: {} bytes", self.0, payload.len());
    }
}

impl AudioDecoderFacade for LoggingDecoder {
    fn reset(&self) {
        log::debug!("{} decoder reset", self.0);
    }

    fn decode(&self, payload: bytes::Bytes) {
        log::debug!("{} decode: {} bytes", self.0, payload.len());
    }
}

struct LoggingDimensionObserver;

impl DimensionObserver for LoggingDimensionObserver {
    fn on_dimension(&self, width: u32, height: u32) {
        log::info!("dimension changed: {width}x{height}");
    }
}
