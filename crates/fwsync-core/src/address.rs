//! Validated global IPv6 address
//!
//! [`Address`] is the only address type the reconciler and the router
//! drivers accept. Construction enforces that the address can be the
//! destination of an inbound allow-rule: it must not be link-local
//! (`fe80::/10`), unspecified, loopback, multicast or IPv4-mapped.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;

use crate::error::Error;

/// Why a candidate IPv6 address was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Address in `fe80::/10`
    LinkLocal,
    /// `::`
    Unspecified,
    /// `::1`
    Loopback,
    /// Address in `ff00::/8`
    Multicast,
    /// `::ffff:a.b.c.d`
    Ipv4Mapped,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::LinkLocal => "link-local",
            Rejection::Unspecified => "unspecified",
            Rejection::Loopback => "loopback",
            Rejection::Multicast => "multicast",
            Rejection::Ipv4Mapped => "IPv4-mapped",
        };
        f.write_str(reason)
    }
}

/// Returns true for addresses in `fe80::/10`
pub fn is_link_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

/// Classify an IPv6 address, returning the reason it cannot be protected
pub fn check_global(ip: &Ipv6Addr) -> std::result::Result<(), Rejection> {
    if is_link_local(ip) {
        Err(Rejection::LinkLocal)
    } else if ip.is_unspecified() {
        Err(Rejection::Unspecified)
    } else if ip.is_loopback() {
        Err(Rejection::Loopback)
    } else if ip.is_multicast() {
        Err(Rejection::Multicast)
    } else if ip.to_ipv4_mapped().is_some() {
        Err(Rejection::Ipv4Mapped)
    } else {
        Ok(())
    }
}

/// A global-scope IPv6 address
///
/// Immutable once constructed. Equality is on the numeric address, so two
/// textual spellings of the same address (`2001:DB8::1`, `2001:db8:0::1`)
/// compare equal after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Ipv6Addr", into = "Ipv6Addr")]
pub struct Address(Ipv6Addr);

impl Address {
    /// Wrap an IPv6 address after checking it is global
    pub fn new(ip: Ipv6Addr) -> Result<Self, Error> {
        check_global(&ip)
            .map(|()| Self(ip))
            .map_err(|why| Error::address_unavailable(format!("{ip} is {why}")))
    }

    /// The underlying address
    pub fn ip(&self) -> Ipv6Addr {
        self.0
    }

    /// Whether a rule table cell refers to this address.
    ///
    /// Cells that do not parse as IPv6 never match.
    pub fn matches_text(&self, text: &str) -> bool {
        text.trim()
            .parse::<Ipv6Addr>()
            .map(|ip| ip == self.0)
            .unwrap_or(false)
    }
}

impl TryFrom<Ipv6Addr> for Address {
    type Error = Error;

    fn try_from(ip: Ipv6Addr) -> Result<Self, Self::Error> {
        Self::new(ip)
    }
}

impl TryFrom<IpAddr> for Address {
    type Error = Error;

    fn try_from(ip: IpAddr) -> Result<Self, Self::Error> {
        match ip {
            IpAddr::V6(v6) => Self::new(v6),
            IpAddr::V4(v4) => Err(Error::address_unavailable(format!(
                "{v4} is not an IPv6 address"
            ))),
        }
    }
}

impl From<Address> for Ipv6Addr {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ip: Ipv6Addr = s
            .trim()
            .parse()
            .map_err(|e| Error::parse(format!("'{s}' is not an IPv6 address: {e}")))?;
        Self::new(ip)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
