//! Low-latency screen mirroring core: a producer session and a consumer
//! session, each wiring the `transport` crate's state machines to the
//! external capture/codec/render façades named in `facade`.

pub mod consumer;
pub mod error;
pub mod facade;
pub mod producer;

pub use consumer::{Consumer, ConsumerOptions, Endpoint};
pub use error::Error;
pub use facade::{AudioDecoderFacade, AudioEncoderFacade, DimensionObserver, VideoDecoderFacade, VideoEncoderFacade};
pub use producer::{Producer, ProducerOptions};

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    struct NoopEncoder;
    impl VideoEncoderFacade for NoopEncoder {
        fn request_key_frame(&self) {}
    }
    impl AudioEncoderFacade for NoopEncoder {}

    #[derive(Default)]
    struct RecordingDecoder {
        payloads: Mutex<Vec<Bytes>>,
        reset_count: AtomicUsize,
    }

    impl VideoDecoderFacade for RecordingDecoder {
        fn reset(&self) {
            self.reset_count.fetch_add(1, Ordering::SeqCst);
        }

        fn decode(&self, payload: Bytes) {
            self.payloads.lock().unwrap().push(payload);
        }
    }

    impl AudioDecoderFacade for RecordingDecoder {
        fn reset(&self) {
            self.reset_count.fetch_add(1, Ordering::SeqCst);
        }

        fn decode(&self, payload: Bytes) {
            self.payloads.lock().unwrap().push(payload);
        }
    }

    #[derive(Default)]
    struct RecordingDimensionObserver {
        seen: Mutex<Vec<(u32, u32)>>,
    }

    impl DimensionObserver for RecordingDimensionObserver {
        fn on_dimension(&self, width: u32, height: u32) {
            self.seen.lock().unwrap().push((width, height));
        }
    }

    /// S1 (cold join): a consumer connecting after the caches are already
    /// populated observes VideoConfig, AudioConfig, the cached key frame and
    /// the current Dimension before anything else.
    #[test]
    fn cold_join_replays_caches_to_a_new_consumer() {
        let producer = Producer::start(
            ProducerOptions {
                bind: "127.0.0.1:0".parse().unwrap(),
                advertise: false,
                ..ProducerOptions::default()
            },
            Arc::new(NoopEncoder),
            Arc::new(NoopEncoder),
        )
        .unwrap();

        producer.submit_video_config(Bytes::from_static(&[0x67, 0x42, 0x00, 0x1E]));
        producer.submit_audio_config(Bytes::from_static(&[0x11, 0x90]));
        producer.submit_video_frame(Bytes::from(vec![0x65u8; 768]), true);
        producer.set_dimension(1280, 720);

        // Give the writer thread a moment to pick up the caches before a
        // client ever connects, matching the "already streaming" premise.
        std::thread::sleep(Duration::from_millis(50));

        let video_decoder = Arc::new(RecordingDecoder::default());
        let audio_decoder = Arc::new(RecordingDecoder::default());
        let dimension_observer = Arc::new(RecordingDimensionObserver::default());

        let consumer = Consumer::connect(
            ConsumerOptions {
                endpoint: Endpoint::Direct(producer.local_addr()),
                ..ConsumerOptions::default()
            },
            video_decoder.clone(),
            audio_decoder.clone(),
            dimension_observer.clone(),
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if !dimension_observer.seen.lock().unwrap().is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        assert_eq!(video_decoder.payloads.lock().unwrap().len(), 2); // config + key frame
        assert_eq!(audio_decoder.payloads.lock().unwrap().len(), 1); // config
        assert_eq!(
            dimension_observer.seen.lock().unwrap().as_slice(),
            &[(1280, 720)]
        );
        assert_eq!(video_decoder.reset_count.load(Ordering::SeqCst), 1);

        consumer.disconnect();
        producer.shutdown();
    }

    /// §7: a reported permission loss tears the service down and is visible
    /// to anyone polling `last_error`.
    #[test]
    fn report_permission_loss_stops_the_server_and_records_the_reason() {
        let producer = Producer::start(
            ProducerOptions {
                bind: "127.0.0.1:0".parse().unwrap(),
                advertise: false,
                ..ProducerOptions::default()
            },
            Arc::new(NoopEncoder),
            Arc::new(NoopEncoder),
        )
        .unwrap();

        assert!(producer.last_error().is_none());

        producer.report_permission_loss("capture permission revoked");

        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline && producer.state() != transport::ServerState::Stopped {
            std::thread::sleep(Duration::from_millis(10));
        }

        assert_eq!(producer.state(), transport::ServerState::Stopped);
        assert_eq!(
            producer.last_error().as_deref(),
            Some("permission loss: capture permission revoked")
        );
    }
}
