//! Consumer-side session (§2, §4.3, §4.4): connects to a producer, owns the
//! reader thread running the Transport Client and Stream Parser, and
//! dispatches packets to decoder façades and the dimension observer.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use transport::protocol::decode_dimension;
use transport::{ClientState, ParserConfig, PacketKind, TransportClient};

use crate::error::Error;
use crate::facade::{AudioDecoderFacade, DimensionObserver, VideoDecoderFacade};

/// How a consumer locates its producer (§6.5): either bypass discovery with
/// a direct address, or browse mDNS for up to a timeout and take the first
/// resolved service.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum Endpoint {
    Discover { timeout: Duration },
    Direct(SocketAddr),
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct ConsumerOptions {
    pub endpoint: Endpoint,
    pub max_payload_len: u32,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::Discover {
                timeout: Duration::from_secs(5),
            },
            max_payload_len: transport::protocol::DEFAULT_MAX_PAYLOAD_LEN,
        }
    }
}

/// One consumer session: a reader thread driving the Transport Client and
/// Stream Parser, dispatching to the supplied decoder façades.
pub struct Consumer {
    client: Arc<TransportClient>,
    reader_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Consumer {
    pub fn connect(
        options: ConsumerOptions,
        video_decoder: Arc<dyn VideoDecoderFacade>,
        audio_decoder: Arc<dyn AudioDecoderFacade>,
        dimension_observer: Arc<dyn DimensionObserver>,
    ) -> Result<Self, Error> {
        let addr = match options.endpoint {
            Endpoint::Direct(addr) => addr,
            Endpoint::Discover { timeout } => discovery::discover_one(timeout)?.addr,
        };

        let client = Arc::new(TransportClient::new(ParserConfig::new(
            options.max_payload_len,
        )));

        let reader_thread = {
            let client = client.clone();
            let reset_video = video_decoder.clone();
            let reset_audio = audio_decoder.clone();

            thread::Builder::new()
                .name("TransportReaderThread".to_string())
                .spawn(move || {
                    let result = client.run(
                        addr,
                        move || {
                            reset_video.reset();
                            reset_audio.reset();
                        },
                        move |kind, payload| match kind {
                            PacketKind::VideoConfig | PacketKind::Video => {
                                video_decoder.decode(payload)
                            }
                            PacketKind::AudioConfig | PacketKind::Audio => {
                                audio_decoder.decode(payload)
                            }
                            PacketKind::Dimension => {
                                if let Some(size) = decode_dimension(&payload) {
                                    dimension_observer.on_dimension(size.width, size.height);
                                }
                            }
                            PacketKind::Unknown(_) => {}
                        },
                    );

                    if let Err(err) = result {
                        log::warn!("consumer session ended: {err}");
                    }
                })?
        };

        Ok(Self {
            client,
            reader_thread: Mutex::new(Some(reader_thread)),
        })
    }

    pub fn state(&self) -> ClientState {
        self.client.state()
    }

    pub fn last_error(&self) -> Option<String> {
        self.client.last_error()
    }

    /// Cancels the reader thread; idempotent.
    pub fn disconnect(&self) {
        self.client.disconnect();

        if let Some(handle) = self.reader_thread.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        self.disconnect();
    }
}
