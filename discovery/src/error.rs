use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Mdns(#[from] mdns_sd::Error),

    #[error("no service resolved within the browse timeout")]
    Timeout,
}
