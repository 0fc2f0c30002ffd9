//! Zero-configuration discovery façade (§4.6): producers advertise their
//! listening port via mDNS/DNS-SD; consumers browse and resolve to an
//! endpoint. Discovery never touches the data path.

pub mod advertiser;
pub mod browser;
pub mod error;

pub use advertiser::{Advertiser, SERVICE_TYPE};
pub use browser::{browse_once, discover_one, Resolved};
pub use error::Error;
