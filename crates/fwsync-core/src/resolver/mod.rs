//! Address resolution
//!
//! Picks the single address the run protects: the first global IPv6
//! candidate, in the order the [`AddressSource`] enumerated them.

use std::net::IpAddr;
use tracing::{debug, info};

use crate::address::{Address, check_global};
use crate::error::{Error, Result};
use crate::traits::AddressSource;

/// Return the first candidate that is a usable global IPv6 address
pub fn select_global(candidates: &[IpAddr]) -> Option<Address> {
    candidates.iter().find_map(|ip| match ip {
        IpAddr::V6(v6) => match check_global(v6) {
            Ok(()) => Address::new(*v6).ok(),
            Err(why) => {
                debug!("Skipping {} ({})", v6, why);
                None
            }
        },
        IpAddr::V4(_) => None,
    })
}

/// Resolves the current address from an [`AddressSource`]
pub struct AddressResolver<'a> {
    source: &'a dyn AddressSource,
}

impl<'a> AddressResolver<'a> {
    pub fn new(source: &'a dyn AddressSource) -> Self {
        Self { source }
    }

    /// Resolve the address to protect
    ///
    /// # Returns
    ///
    /// - `Ok(Address)`: The first global IPv6 candidate
    /// - `Err(Error::AddressUnavailable)`: Enumeration failed or nothing usable
    pub async fn resolve(&self) -> Result<Address> {
        let candidates = self.source.candidates().await.map_err(|e| {
            Error::address_unavailable(format!(
                "{} enumeration failed: {}",
                self.source.source_name(),
                e
            ))
        })?;

        debug!(
            "{} returned {} candidate(s)",
            self.source.source_name(),
            candidates.len()
        );

        let address = select_global(&candidates).ok_or_else(|| {
            Error::address_unavailable(format!(
                "no global IPv6 address among {} candidate(s) from {}",
                candidates.len(),
                self.source.source_name()
            ))
        })?;

        info!("Resolved address {} via {}", address, self.source.source_name());
        Ok(address)
    }
}
