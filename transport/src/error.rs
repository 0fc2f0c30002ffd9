use common::error::ErrorKind;
use thiserror::Error;

/// Transport-level failures (§7). Each variant names one taxonomy kind;
/// `kind()` maps back to the shared, crate-agnostic classification.
#[derive(Debug, Error)]
pub enum Error {
    #[error("transient I/O failure: {0}")]
    TransientIo(#[from] std::io::Error),

    #[error("framing violation: {0}")]
    Framing(String),

    #[error("permission loss: {0}")]
    PermissionLoss(String),
}

impl Error {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::TransientIo(_) => ErrorKind::TransientIo,
            Self::Framing(_) => ErrorKind::Framing,
            Self::PermissionLoss(_) => ErrorKind::PermissionLoss,
        }
    }
}
