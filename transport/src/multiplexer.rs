//! Packet Multiplexer (§4.1): producer-side caches, bounded queues and the
//! drain priority that the Transport Server writes to the wire.

use std::collections::VecDeque;

use bytes::Bytes;
use common::atomic::AtomicOption;
use common::Size;
use parking_lot::{Mutex, RwLock};

use crate::protocol::{encode_dimension, PacketKind};

/// Interleave batch size for §4.1.2 (chosen and justified in DESIGN.md).
pub const INTERLEAVE_BATCH: usize = 2;

/// Default bound for `video_queue`.
pub const DEFAULT_VIDEO_QUEUE_CAPACITY: usize = 64;

/// Default bound for `audio_queue`.
pub const DEFAULT_AUDIO_QUEUE_CAPACITY: usize = 128;

/// One encoder output handed to `Multiplexer::submit` (§4.1).
pub enum Submission {
    VideoConfig(Bytes),
    AudioConfig(Bytes),
    Dimension(Size),
    Video { payload: Bytes, is_key: bool },
    Audio(Bytes),
}

struct QueuedVideo {
    payload: Bytes,
    is_key: bool,
}

/// Accepts encoder outputs, updates session caches, and presents an ordered
/// drain to the writer thread. All operations are non-blocking.
pub struct Multiplexer {
    video_config: AtomicOption<Bytes>,
    audio_config: AtomicOption<Bytes>,
    key_frame: AtomicOption<Bytes>,
    dimension: RwLock<Option<Size>>,

    pending_video_config: Mutex<bool>,
    pending_audio_config: Mutex<bool>,
    pending_dimension: Mutex<bool>,

    video_queue: Mutex<VecDeque<QueuedVideo>>,
    audio_queue: Mutex<VecDeque<Bytes>>,

    video_capacity: usize,
    audio_capacity: usize,
}

impl Multiplexer {
    pub fn new(video_capacity: usize, audio_capacity: usize) -> Self {
        Self {
            video_config: AtomicOption::none(),
            audio_config: AtomicOption::none(),
            key_frame: AtomicOption::none(),
            dimension: RwLock::new(None),
            pending_video_config: Mutex::new(false),
            pending_audio_config: Mutex::new(false),
            pending_dimension: Mutex::new(false),
            video_queue: Mutex::new(VecDeque::new()),
            audio_queue: Mutex::new(VecDeque::new()),
            video_capacity,
            audio_capacity,
        }
    }

    /// Never blocks: the encoder façade calling this must never stall on I/O.
    pub fn submit(&self, submission: Submission) {
        match submission {
            Submission::VideoConfig(bytes) => {
                self.video_config.set(bytes);
                *self.pending_video_config.lock() = true;
            }
            Submission::AudioConfig(bytes) => {
                self.audio_config.set(bytes);
                *self.pending_audio_config.lock() = true;
            }
            Submission::Dimension(size) => {
                *self.dimension.write() = Some(size);
                *self.pending_dimension.lock() = true;
            }
            Submission::Video { payload, is_key } => {
                if is_key {
                    self.key_frame.set(payload.clone());
                }

                self.enqueue_video(payload, is_key);
            }
            Submission::Audio(payload) => self.enqueue_audio(payload),
        }
    }

    fn enqueue_video(&self, payload: Bytes, is_key: bool) {
        let mut queue = self.video_queue.lock();

        if queue.len() < self.video_capacity {
            queue.push_back(QueuedVideo { payload, is_key });
            return;
        }

        if !is_key {
            // Full, incoming is non-key: only the oldest frame is a
            // candidate so the cached recovery point is never disturbed by
            // an ordinary frame.
            if queue.front().is_some_and(|f| !f.is_key) {
                queue.pop_front();
                queue.push_back(QueuedVideo { payload, is_key });
            }
            // else: oldest is a key frame, drop the incoming non-key frame.
            return;
        }

        // Full, incoming is a key frame: evict the oldest non-key frame
        // anywhere in the queue so the new recovery point is admitted
        // without losing another key frame if one can be spared.
        if let Some(pos) = queue.iter().position(|f| !f.is_key) {
            queue.remove(pos);
        } else {
            // Nothing but key frames queued: the new key supersedes the
            // oldest one as the recovery point.
            queue.pop_front();
        }

        queue.push_back(QueuedVideo { payload, is_key });
    }

    fn enqueue_audio(&self, payload: Bytes) {
        let mut queue = self.audio_queue.lock();

        if queue.len() >= self.audio_capacity {
            queue.pop_front();
        }

        queue.push_back(payload);
    }

    /// Clears queues and pending-to-transmit markers for a new session.
    /// Caches are left intact; they are replayed to the next client.
    pub fn reset_session(&self) {
        self.video_queue.lock().clear();
        self.audio_queue.lock().clear();
        *self.pending_video_config.lock() = false;
        *self.pending_audio_config.lock() = false;
        *self.pending_dimension.lock() = false;
    }

    /// The ordered accept-time replay (§4.2, §6.3): VideoConfig, AudioConfig,
    /// KeyFrame-as-Video, Dimension, each only if currently cached. Also
    /// clears the pending markers for those kinds, since this replay already
    /// carries the current value.
    pub fn accept_replay(&self) -> Vec<(PacketKind, Bytes)> {
        let mut out = Vec::with_capacity(4);

        if let Some(config) = self.video_config.get() {
            out.push((PacketKind::VideoConfig, config));
        }

        if let Some(config) = self.audio_config.get() {
            out.push((PacketKind::AudioConfig, config));
        }

        if let Some(key_frame) = self.key_frame.get() {
            out.push((PacketKind::Video, key_frame));
        }

        if let Some(size) = *self.dimension.read() {
            out.push((
                PacketKind::Dimension,
                Bytes::copy_from_slice(&encode_dimension(size)),
            ));
        }

        *self.pending_video_config.lock() = false;
        *self.pending_audio_config.lock() = false;
        *self.pending_dimension.lock() = false;

        out
    }

    /// Returns the next batch of packets to write, honoring §4.1.2's
    /// priority: pending VideoConfig, then pending AudioConfig, then pending
    /// Dimension, then an interleaved slice of the video/audio queues.
    pub fn drain(&self) -> Vec<(PacketKind, Bytes)> {
        let mut out = Vec::new();

        if std::mem::take(&mut *self.pending_video_config.lock()) {
            if let Some(config) = self.video_config.get() {
                out.push((PacketKind::VideoConfig, config));
            }
        }

        if std::mem::take(&mut *self.pending_audio_config.lock()) {
            if let Some(config) = self.audio_config.get() {
                out.push((PacketKind::AudioConfig, config));
            }
        }

        if std::mem::take(&mut *self.pending_dimension.lock()) {
            if let Some(size) = *self.dimension.read() {
                out.push((
                    PacketKind::Dimension,
                    Bytes::copy_from_slice(&encode_dimension(size)),
                ));
            }
        }

        let mut video_queue = self.video_queue.lock();
        let mut audio_queue = self.audio_queue.lock();

        for _ in 0..INTERLEAVE_BATCH {
            if let Some(frame) = video_queue.pop_front() {
                out.push((PacketKind::Video, frame.payload));
            }

            if let Some(frame) = audio_queue.pop_front() {
                out.push((PacketKind::Audio, frame));
            }
        }

        out
    }

    /// True once a key frame has been cached at least once. Used by the
    /// server to diagnose an encoder façade that never produces one (§9).
    pub fn has_key_frame(&self) -> bool {
        self.key_frame.is_some()
    }

    #[cfg(test)]
    fn video_queue_len(&self) -> usize {
        self.video_queue.lock().len()
    }
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::new(DEFAULT_VIDEO_QUEUE_CAPACITY, DEFAULT_AUDIO_QUEUE_CAPACITY)
    }
}
