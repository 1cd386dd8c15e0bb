//! Core traits for the fwsync system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AddressSource`]: Enumerate the host's candidate addresses
//! - [`RouterSession`]: Read and mutate the router's IPv6 rule table

pub mod address_source;
pub mod router;

pub use address_source::{AddressSource, AddressSourceFactory};
pub use router::{LoginOutcome, RouterDriverFactory, RouterSession};
