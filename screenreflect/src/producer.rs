//! Producer-side session (§2, §4.5): wires encoder output into the Packet
//! Multiplexer and the Transport Server, and owns the encoder-feedback
//! contract (client-connected and dimension-change -> request key frame).

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use common::Size;
use parking_lot::Mutex;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use transport::multiplexer::Submission;
use transport::{Multiplexer, TransportServer};

use crate::error::Error;
use crate::facade::{AudioEncoderFacade, VideoEncoderFacade};

/// Producer-side tunables with no single externally-mandated value; chosen
/// defaults are justified in DESIGN.md.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct ProducerOptions {
    pub bind: SocketAddr,
    pub advertise: bool,
    pub video_queue_capacity: usize,
    pub audio_queue_capacity: usize,
}

impl Default for ProducerOptions {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:0".parse().unwrap(),
            advertise: true,
            video_queue_capacity: transport::multiplexer::DEFAULT_VIDEO_QUEUE_CAPACITY,
            audio_queue_capacity: transport::multiplexer::DEFAULT_AUDIO_QUEUE_CAPACITY,
        }
    }
}

/// One producer: a listening endpoint, a multiplexer, and (optionally) an
/// mDNS advertisement. Capture/encoder façades call the `submit_*` methods
/// and `set_dimension`; the session owns the rest.
pub struct Producer {
    multiplexer: Arc<Multiplexer>,
    server: Arc<TransportServer>,
    local_addr: SocketAddr,
    video_encoder: Arc<dyn VideoEncoderFacade>,
    advertiser: Mutex<Option<discovery::Advertiser>>,
    writer_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Producer {
    pub fn start(
        options: ProducerOptions,
        video_encoder: Arc<dyn VideoEncoderFacade>,
        _audio_encoder: Arc<dyn AudioEncoderFacade>,
    ) -> Result<Self, Error> {
        let multiplexer = Arc::new(Multiplexer::new(
            options.video_queue_capacity,
            options.audio_queue_capacity,
        ));

        let server = Arc::new(TransportServer::new(multiplexer.clone()));
        let local_addr = server.listen(options.bind)?;

        let advertiser = if options.advertise {
            match discovery::Advertiser::new(local_addr.ip(), local_addr.port()) {
                Ok(advertiser) => Some(advertiser),
                Err(err) => {
                    log::warn!("mDNS advertise failed, continuing without it: {err}");
                    None
                }
            }
        } else {
            None
        };

        let writer_thread = {
            let server = server.clone();
            let video_encoder = video_encoder.clone();

            thread::Builder::new()
                .name("TransportWriterThread".to_string())
                .spawn(move || {
                    if let Err(err) = server.serve(move || video_encoder.request_key_frame()) {
                        log::error!("transport server stopped: {err}");
                    }
                })?
        };

        Ok(Self {
            multiplexer,
            server,
            local_addr,
            video_encoder,
            advertiser: Mutex::new(advertiser),
            writer_thread: Mutex::new(Some(writer_thread)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> transport::ServerState {
        self.server.state()
    }

    /// Set once `report_permission_loss` has torn the session down, so a
    /// caller can log why the service stopped.
    pub fn last_error(&self) -> Option<String> {
        self.server.last_error()
    }

    /// Called by an encoder façade when capture or encode permission is
    /// revoked externally (§7: producer-fatal). Tears down the current
    /// session and stops accepting new ones; the service must be restarted
    /// to resume.
    pub fn report_permission_loss(&self, reason: impl Into<String>) {
        self.server
            .shutdown_with_error(transport::Error::PermissionLoss(reason.into()));
    }

    /// Encoder emits this whenever its codec-specific init bytes are first
    /// available or change (§4.5).
    pub fn submit_video_config(&self, config: Bytes) {
        self.multiplexer.submit(Submission::VideoConfig(config));
    }

    pub fn submit_audio_config(&self, config: Bytes) {
        self.multiplexer.submit(Submission::AudioConfig(config));
    }

    /// `is_key` is the encoder's own tag (§4.5); the multiplexer derives the
    /// cache-on-write and drop-policy behavior from it.
    pub fn submit_video_frame(&self, payload: Bytes, is_key: bool) {
        self.multiplexer
            .submit(Submission::Video { payload, is_key });
    }

    pub fn submit_audio_frame(&self, payload: Bytes) {
        self.multiplexer.submit(Submission::Audio(payload));
    }

    /// Capture façade notifies the core on dimension change: the core
    /// issues a Dimension packet and instructs the encoder to emit a key
    /// frame (§4.5).
    pub fn set_dimension(&self, width: u32, height: u32) {
        self.multiplexer
            .submit(Submission::Dimension(Size::new(width, height)));
        self.video_encoder.request_key_frame();
    }

    pub fn shutdown(&self) {
        self.server.shutdown();

        if let Some(advertiser) = self.advertiser.lock().take() {
            advertiser.shutdown();
        }

        if let Some(handle) = self.writer_thread.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
