// # Address Source Trait
//
// Defines the interface for enumerating the host's candidate addresses.
//
// ## Implementations
//
// - Interface enumeration (getifaddrs) and hostname lookup: `fwsync-ip-local`
// - Echo service over HTTP: `fwsync-ip-http`
//
// ## Usage
//
// ```rust,ignore
// use fwsync_core::{AddressResolver, AddressSource};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* AddressSource implementation */;
//
//     // Pick the address to protect
//     let address = AddressResolver::new(&source).resolve().await?;
//     println!("protecting {address}");
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for address source implementations
///
/// A source only enumerates. Choosing which candidate to protect (and
/// rejecting link-local and other non-global addresses) belongs to
/// [`crate::AddressResolver`].
///
/// # Ordering
///
/// Candidates must be returned in the order the underlying facility
/// produced them. The resolver picks the first usable one and does not sort.
#[async_trait]
pub trait AddressSource: Send + Sync {
    /// Enumerate the host's addresses
    ///
    /// May include IPv4 and non-global IPv6 addresses; the resolver filters.
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<IpAddr>)`: Candidates in enumeration order (possibly empty)
    /// - `Err(Error)`: If enumeration itself failed
    async fn candidates(&self) -> Result<Vec<IpAddr>, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing address sources from configuration
pub trait AddressSourceFactory: Send + Sync {
    /// Create an AddressSource instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this source type
    ///
    /// # Returns
    ///
    /// A boxed AddressSource trait object
    fn create(
        &self,
        config: &crate::config::AddressSourceConfig,
    ) -> Result<Box<dyn AddressSource>, crate::Error>;
}
