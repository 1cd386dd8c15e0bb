// # fwsync-core
//
// Core library for keeping a router's IPv6 inbound allow-list pointed at
// this host's current global address.
//
// ## Architecture Overview
//
// - **Address**: Validated global IPv6 address (never link-local)
// - **AddressSource**: Trait for enumerating the host's candidate addresses
// - **AddressResolver**: Picks the address to protect from a source
// - **RouterSession**: Trait for the router's management interface
// - **reconcile::plan**: Pure diff of desired vs. observed rule table
// - **SyncEngine**: Runs one login → reconcile → logout cycle
// - **DriverRegistry**: Plugin-based registry for drivers and sources
//
// ## Design Principles
//
// 1. **Pure Decisions**: Planning has no side effects and never fails
// 2. **Serialized Mutations**: One router call in flight, each acknowledged
// 3. **Bounded Waits**: Every router call has a timeout
// 4. **Partial-Failure Tolerance**: A stuck row never blocks the rest
// 5. **Library-First**: All core functionality can be used as a library

pub mod address;
pub mod config;
pub mod engine;
pub mod error;
pub mod reconcile;
pub mod registry;
pub mod resolver;
pub mod rule;
pub mod traits;

// Re-export core types for convenience
pub use address::Address;
pub use config::{AddressSourceConfig, Credentials, EngineConfig, RouterConfig, SyncConfig};
pub use engine::{RunReport, RunSummary, SessionState, SyncEngine, SyncEvent};
pub use error::{Error, Result};
pub use reconcile::ReconciliationPlan;
pub use registry::DriverRegistry;
pub use resolver::AddressResolver;
pub use rule::{DesiredRuleSpec, FirewallRule};
pub use traits::{AddressSource, LoginOutcome, RouterSession};
