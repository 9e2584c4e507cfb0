//! A Rust library for managing network connections via ConnMan.
//!
//! This crate provides a high-level async API over the `net.connman` D-Bus
//! interfaces:
//!
//! - Listing technologies and services, filtered by type or by property query
//! - Scanning, powering technologies and toggling tethering
//! - Connecting and disconnecting services, with or without waiting for `online`
//! - Configuring wired services (IPv4, nameservers)
//! - Observing property changes of the manager, technologies and services
//!
//! # Example
//!
//! ```no_run
//! use connmrs::{ConnectionManager, Query, TechnologyType};
//!
//! # async fn example() -> connmrs::Result<()> {
//! let cm = ConnectionManager::new().await?;
//!
//! // Scan and list Wi-Fi services
//! let wifi = cm.technology(TechnologyType::Wifi).await?;
//! wifi.scan().await?;
//! for service in wifi.services().await? {
//!     println!("{} ({}%)", service.name().unwrap_or("<hidden>"), service.strength().unwrap_or(0));
//! }
//!
//! // Find a connected service
//! let query = Query::new().any_of("State", ["ready", "online"]);
//! let (handle, service) = cm.search_service(&query, None).await?;
//! println!("connected: {service}, bound to {:?}", handle.path());
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All operations return `Result<T, ConnmanError>`. Errors returned by the
//! daemon are passed through verbatim as [`ConnmanError::Remote`]; failed
//! property writes are wrapped in [`ConnmanError::PropertySet`] naming the
//! property. Nothing is retried.
//!
//! # Signals
//!
//! Handles subscribe to the daemon's `PropertyChanged` signals when they bind
//! an object and expose them as [`PropertyEvents`]. Rebinding a service handle
//! never lets events of the previous service through.
//!
//! # Logging
//!
//! This crate uses the [`log`](https://docs.rs/log) facade. To see log output,
//! add a logging implementation like `env_logger`.

// Internal implementation modules
mod core;
mod monitoring;
mod types;
mod util;

// Public API modules
pub mod api;
pub mod dbus;

// Re-exported public API
pub use api::agent::{Agent, AgentHandle};
pub use api::connection_manager::ConnectionManager;
pub use api::models::{
    ConnmanError, Ipv4Config, Ipv4Method, ManagerEvent, PropertyChange, PropertyMap,
    PropertyValue, Service, ServiceState, TechnologyInfo, TechnologyType, TimeoutConfig,
    WiredConfig,
};
pub use api::query::{Query, QueryValue};
pub use api::service::{BluetoothService, ServiceBase, ServiceHandle, WifiService, WiredService};
pub use api::technology::Technology;
pub use monitoring::manager::ManagerEvents;
pub use monitoring::property_bus::PropertyEvents;

/// A specialized `Result` type for connmrs operations.
pub type Result<T> = std::result::Result<T, ConnmanError>;
