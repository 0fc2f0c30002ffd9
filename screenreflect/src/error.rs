use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] transport::Error),

    #[error(transparent)]
    Discovery(#[from] discovery::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
