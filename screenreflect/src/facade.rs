//! Trait boundaries for the components the core treats as external
//! collaborators (§1): capture, codec engines, and rendering. The core only
//! ever calls these; it never implements them.

use bytes::Bytes;

/// Called by the core when it wants the video encoder to produce a key
/// frame as soon as possible, without waiting for its periodic interval
/// (§4.5): on client connect, and on every dimension change.
pub trait VideoEncoderFacade: Send + Sync {
    fn request_key_frame(&self);
}

/// The audio encoder has no feedback hooks from the core today, but is
/// named separately from the video encoder so a future contract addition
/// (e.g. a bitrate hint) does not have to widen an unrelated trait.
pub trait AudioEncoderFacade: Send + Sync {}

/// Consumer-side video decoder. `reset` is called once on entering
/// `Receiving`, before any bytes are read (§4.3); `decode` receives each
/// `VideoConfig`/`Video` payload in wire order on the reader thread and
/// must return quickly (§4.4).
pub trait VideoDecoderFacade: Send + Sync {
    fn reset(&self);
    fn decode(&self, payload: Bytes);
}

/// Consumer-side audio decoder, mirroring `VideoDecoderFacade`.
pub trait AudioDecoderFacade: Send + Sync {
    fn reset(&self);
    fn decode(&self, payload: Bytes);
}

/// Receives dimension changes surfaced by the Stream Parser (§4.4).
pub trait DimensionObserver: Send + Sync {
    fn on_dimension(&self, width: u32, height: u32);
}
