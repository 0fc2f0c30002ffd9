//! mDNS/DNS-SD browse (§4.6, §6.4): resolves producers advertising under
//! the fixed service type to a connectable `host:port`.

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};

use crate::advertiser::SERVICE_TYPE;
use crate::error::Error;

/// One resolved producer.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub name: String,
    pub addr: SocketAddr,
}

/// Browses for up to `timeout`, returning every producer resolved in that
/// window. An empty result means none were found, not an error.
pub fn browse_once(timeout: Duration) -> Result<Vec<Resolved>, Error> {
    let daemon = ServiceDaemon::new()?;
    let receiver = daemon.browse(SERVICE_TYPE)?;

    let deadline = Instant::now() + timeout;
    let mut found = Vec::new();

    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match receiver.recv_timeout(remaining) {
            Ok(ServiceEvent::ServiceResolved(info)) => {
                if let Some(addr) = resolved_address(&info) {
                    found.push(Resolved {
                        name: info.get_fullname().to_string(),
                        addr,
                    });
                }
            }
            Ok(_) => continue,
            Err(_) => break,
        }
    }

    let _ = daemon.stop_browse(SERVICE_TYPE);
    Ok(found)
}

/// Convenience wrapper around `browse_once` for the common "connect to
/// whichever producer answers first" case (§6.5's discovery path).
pub fn discover_one(timeout: Duration) -> Result<Resolved, Error> {
    browse_once(timeout)?.into_iter().next().ok_or(Error::Timeout)
}

fn resolved_address(info: &ServiceInfo) -> Option<SocketAddr> {
    info.get_addresses()
        .iter()
        .find(|addr| matches!(addr, IpAddr::V4(_)))
        .map(|addr| SocketAddr::new(*addr, info.get_port()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_type_matches_the_fixed_string() {
        assert_eq!(SERVICE_TYPE, "_screenreflect._tcp.local.");
    }
}
