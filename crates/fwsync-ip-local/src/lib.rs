// # Local Address Sources
//
// This crate provides address sources that ask the local machine for its
// addresses, without any network round trip.
//
// ## Sources
//
// - `interfaces`: enumerates interface addresses with getifaddrs(3),
//   optionally restricted to one interface. Primary source on Unix.
// - `hostname`: resolves the machine's own hostname. Works anywhere the
//   resolver knows the host, including platforms without getifaddrs.
//
// Both return every address they see, in enumeration order. Picking the
// global IPv6 one is the resolver's job.

use fwsync_core::config::AddressSourceConfig;
use fwsync_core::traits::{AddressSource, AddressSourceFactory};
use fwsync_core::{DriverRegistry, Error, Result};

use std::net::IpAddr;

use tracing::debug;

/// Interface-enumerating address source
#[derive(Debug, Clone, Default)]
pub struct InterfaceAddressSource {
    /// Only report addresses of this interface
    interface: Option<String>,
}

impl InterfaceAddressSource {
    pub fn new(interface: Option<String>) -> Self {
        Self { interface }
    }

    fn wants(&self, name: &str) -> bool {
        self.interface.as_deref().is_none_or(|wanted| wanted == name)
    }

    #[cfg(unix)]
    fn enumerate(&self) -> Result<Vec<IpAddr>> {
        let addrs = nix::ifaddrs::getifaddrs().map_err(|e| Error::Io(e.into()))?;

        let mut found = Vec::new();
        for ifaddr in addrs {
            if !self.wants(&ifaddr.interface_name) {
                continue;
            }
            let Some(storage) = ifaddr.address else {
                continue;
            };
            let ip = if let Some(v6) = storage.as_sockaddr_in6() {
                IpAddr::V6(v6.ip())
            } else if let Some(v4) = storage.as_sockaddr_in() {
                IpAddr::V4(v4.ip())
            } else {
                continue;
            };
            debug!("{}: {}", ifaddr.interface_name, ip);
            found.push(ip);
        }

        if found.is_empty() {
            if let Some(name) = &self.interface {
                debug!("No addresses on interface {}", name);
            }
        }
        Ok(found)
    }

    #[cfg(not(unix))]
    fn enumerate(&self) -> Result<Vec<IpAddr>> {
        Err(Error::config(
            "Interface enumeration is only supported on Unix; use the hostname source",
        ))
    }
}

#[async_trait::async_trait]
impl AddressSource for InterfaceAddressSource {
    async fn candidates(&self) -> Result<Vec<IpAddr>> {
        let source = self.clone();
        tokio::task::spawn_blocking(move || source.enumerate())
            .await
            .map_err(|e| Error::Other(format!("interface enumeration task failed: {e}")))?
    }

    fn source_name(&self) -> &'static str {
        "interfaces"
    }
}

/// Hostname-resolving address source
///
/// The hostname is read when [`AddressSource::candidates`] runs, so a
/// rename between runs is picked up.
#[derive(Debug, Clone, Default)]
pub struct HostnameAddressSource;

impl HostnameAddressSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl AddressSource for HostnameAddressSource {
    async fn candidates(&self) -> Result<Vec<IpAddr>> {
        let name = hostname::get()?
            .into_string()
            .map_err(|raw| Error::parse(format!("hostname is not valid UTF-8: {raw:?}")))?;
        debug!("Resolving own hostname {}", name);

        let addrs = tokio::net::lookup_host((name.as_str(), 0))
            .await
            .map_err(|e| Error::address_unavailable(format!("lookup of {name} failed: {e}")))?;

        let mut found: Vec<IpAddr> = Vec::new();
        for addr in addrs {
            // getaddrinfo reports one entry per socket type
            if !found.contains(&addr.ip()) {
                found.push(addr.ip());
            }
        }
        Ok(found)
    }

    fn source_name(&self) -> &'static str {
        "hostname"
    }
}

/// Factory for interface-enumerating sources
pub struct InterfacesFactory;

impl AddressSourceFactory for InterfacesFactory {
    fn create(&self, config: &AddressSourceConfig) -> Result<Box<dyn AddressSource>> {
        match config {
            AddressSourceConfig::Interfaces { interface } => {
                Ok(Box::new(InterfaceAddressSource::new(interface.clone())))
            }
            _ => Err(Error::config("Invalid config for interface address source")),
        }
    }
}

/// Factory for hostname sources
pub struct HostnameFactory;

impl AddressSourceFactory for HostnameFactory {
    fn create(&self, config: &AddressSourceConfig) -> Result<Box<dyn AddressSource>> {
        match config {
            AddressSourceConfig::Hostname => Ok(Box::new(HostnameAddressSource::new())),
            _ => Err(Error::config("Invalid config for hostname address source")),
        }
    }
}

/// Register both local sources with a registry
pub fn register(registry: &DriverRegistry) {
    registry.register_address_source("interfaces", Box::new(InterfacesFactory));
    registry.register_address_source("hostname", Box::new(HostnameFactory));
}
