//! Plugin-based driver registry
//!
//! The registry allows router drivers and address sources to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fwsync_core::registry::DriverRegistry;
//! use fwsync_core::config::RouterConfig;
//!
//! // Create a registry
//! let registry = DriverRegistry::new();
//!
//! // Register drivers
//! registry.register_router("web", Box::new(web_factory));
//!
//! // Create a driver from config
//! let router = registry.create_router(&RouterConfig::default())?;
//! ```
//!
//! ## Registration
//!
//! Implementations should register themselves during initialization:
//!
//! ```rust,ignore
//! // In fwsync-router-web
//! pub fn register(registry: &DriverRegistry) {
//!     registry.register_router("web", Box::new(WebRouterFactory));
//! }
//! ```

use crate::config::{AddressSourceConfig, RouterConfig};
use crate::error::{Error, Result};
use crate::traits::{AddressSource, AddressSourceFactory, RouterDriverFactory, RouterSession};
use std::collections::HashMap;
use std::sync::RwLock;

/// Registry for plugin-based driver creation
///
/// The registry maintains maps of type names to factory objects,
/// allowing dynamic instantiation of drivers based on configuration.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct DriverRegistry {
    /// Registered router driver factories
    routers: RwLock<HashMap<String, Box<dyn RouterDriverFactory>>>,

    /// Registered address source factories
    sources: RwLock<HashMap<String, Box<dyn AddressSourceFactory>>>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a router driver factory
    ///
    /// # Parameters
    ///
    /// - `name`: Driver type name (e.g., "web")
    /// - `factory`: Factory object for creating driver instances
    pub fn register_router(&self, name: impl Into<String>, factory: Box<dyn RouterDriverFactory>) {
        let mut routers = self.routers.write().unwrap_or_else(|e| e.into_inner());
        routers.insert(name.into(), factory);
    }

    /// Register an address source factory
    ///
    /// # Parameters
    ///
    /// - `name`: Source type name (e.g., "interfaces", "http")
    /// - `factory`: Factory object for creating source instances
    pub fn register_address_source(
        &self,
        name: impl Into<String>,
        factory: Box<dyn AddressSourceFactory>,
    ) {
        let mut sources = self.sources.write().unwrap_or_else(|e| e.into_inner());
        sources.insert(name.into(), factory);
    }

    /// Create a router driver from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn RouterSession>)`: Created driver instance
    /// - `Err(Error)`: If the driver type is not registered or creation fails
    pub fn create_router(&self, config: &RouterConfig) -> Result<Box<dyn RouterSession>> {
        let driver_type = config.type_name();
        let routers = self.routers.read().unwrap_or_else(|e| e.into_inner());

        let factory = routers
            .get(driver_type)
            .ok_or_else(|| Error::config(format!("Unknown router driver type: {}", driver_type)))?;

        factory.create(config)
    }

    /// Create an address source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn AddressSource>)`: Created source instance
    /// - `Err(Error)`: If the source type is not registered or creation fails
    pub fn create_address_source(
        &self,
        config: &AddressSourceConfig,
    ) -> Result<Box<dyn AddressSource>> {
        let source_type = config.type_name();
        let sources = self.sources.read().unwrap_or_else(|e| e.into_inner());

        let factory = sources
            .get(source_type)
            .ok_or_else(|| Error::config(format!("Unknown address source type: {}", source_type)))?;

        factory.create(config)
    }

    /// List all registered router driver types
    pub fn list_routers(&self) -> Vec<String> {
        let routers = self.routers.read().unwrap_or_else(|e| e.into_inner());
        routers.keys().cloned().collect()
    }

    /// List all registered address source types
    pub fn list_address_sources(&self) -> Vec<String> {
        let sources = self.sources.read().unwrap_or_else(|e| e.into_inner());
        sources.keys().cloned().collect()
    }

    /// Check if a router driver type is registered
    pub fn has_router(&self, name: &str) -> bool {
        let routers = self.routers.read().unwrap_or_else(|e| e.into_inner());
        routers.contains_key(name)
    }

    /// Check if an address source type is registered
    pub fn has_address_source(&self, name: &str) -> bool {
        let sources = self.sources.read().unwrap_or_else(|e| e.into_inner());
        sources.contains_key(name)
    }
}
