pub mod atomic;
pub mod error;
pub mod logger;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pixel dimensions of an encoded video stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}
