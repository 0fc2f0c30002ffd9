//! mDNS/DNS-SD advertisement (§4.6, §6.4): publishes the producer's
//! listening port under the fixed service type.
//!
//! Failure to advertise is not fatal to the producer — it only means
//! consumers must fall back to a direct `host:port` override (§6.5).

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::AtomicBool;

use common::atomic::EasyAtomic;
use mdns_sd::{ServiceDaemon, ServiceInfo};

use crate::error::Error;

pub const SERVICE_TYPE: &str = "_screenreflect._tcp.local.";

/// Registers the producer's service with the local mDNS responder on
/// construction; unregisters it exactly once, on `shutdown()` or drop.
pub struct Advertiser {
    daemon: ServiceDaemon,
    service_fullname: String,
    shutdown_called: AtomicBool,
}

impl Advertiser {
    pub fn new(advertise_ip: IpAddr, port: u16) -> Result<Self, Error> {
        let daemon = ServiceDaemon::new()?;

        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "screenreflect-host".to_string());

        let instance_name = format!("ScreenReflect on {hostname}");

        let dns_hostname = hostname
            .to_lowercase()
            .replace(' ', "-")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect::<String>();

        let txt = HashMap::from([("version".to_string(), env!("CARGO_PKG_VERSION").to_string())]);

        let service = ServiceInfo::new(
            SERVICE_TYPE,
            &instance_name,
            &format!("{dns_hostname}.local."),
            advertise_ip,
            port,
            Some(txt),
        )?;

        let fullname = service.get_fullname().to_string();
        daemon.register(service)?;

        log::info!("advertising '{instance_name}' at {advertise_ip}:{port}");

        Ok(Self {
            daemon,
            service_fullname: fullname,
            shutdown_called: AtomicBool::new(false),
        })
    }

    /// Unregisters the service. Safe to call more than once.
    pub fn shutdown(&self) {
        if self.shutdown_called.swap(true) {
            return;
        }

        if let Err(err) = self.daemon.unregister(&self.service_fullname) {
            log::warn!("failed to unregister mDNS service: {err}");
        }
    }
}

impl Drop for Advertiser {
    fn drop(&mut self) {
        self.shutdown();
    }
}
