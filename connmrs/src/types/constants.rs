//! Constants for the ConnMan D-Bus API.
//!
//! Bus names, interface names, well-known object paths, method and property
//! names used when talking to `connmand`.

/// Well-known bus name of the daemon.
pub const SERVICE_NAME: &str = "net.connman";

/// D-Bus interface names.
pub mod interface {
    pub const MANAGER: &str = "net.connman.Manager";
    pub const TECHNOLOGY: &str = "net.connman.Technology";
    pub const SERVICE: &str = "net.connman.Service";
}

/// Fixed object paths.
pub mod path {
    /// The manager object lives at the root path.
    pub const MANAGER: &str = "/";
    /// Prefix of every technology object; the technology type is appended.
    pub const TECHNOLOGY_PREFIX: &str = "/net/connman/technology";
}

/// Remote method names.
pub mod method {
    pub const GET_PROPERTIES: &str = "GetProperties";
    pub const SET_PROPERTY: &str = "SetProperty";
    pub const GET_SERVICES: &str = "GetServices";
    pub const GET_TECHNOLOGIES: &str = "GetTechnologies";
    pub const SCAN: &str = "Scan";
    pub const CONNECT: &str = "Connect";
    pub const DISCONNECT: &str = "Disconnect";
    pub const REMOVE: &str = "Remove";
}

/// Signal names.
pub mod signal {
    pub const PROPERTY_CHANGED: &str = "PropertyChanged";
    pub const TECHNOLOGY_ADDED: &str = "TechnologyAdded";
    pub const TECHNOLOGY_REMOVED: &str = "TechnologyRemoved";
    pub const SERVICES_CHANGED: &str = "ServicesChanged";
}

/// Property names read or written by this crate.
pub mod property {
    pub const NAME: &str = "Name";
    pub const TYPE: &str = "Type";
    pub const STATE: &str = "State";
    pub const ERROR: &str = "Error";
    pub const SECURITY: &str = "Security";
    pub const STRENGTH: &str = "Strength";
    pub const FAVORITE: &str = "Favorite";
    pub const IMMUTABLE: &str = "Immutable";
    pub const AUTO_CONNECT: &str = "AutoConnect";
    pub const ETHERNET: &str = "Ethernet";
    pub const INTERFACE: &str = "Interface";
    pub const POWERED: &str = "Powered";
    pub const CONNECTED: &str = "Connected";
    pub const OFFLINE_MODE: &str = "OfflineMode";
    pub const TETHERING: &str = "Tethering";
    pub const TETHERING_IDENTIFIER: &str = "TetheringIdentifier";
    pub const TETHERING_PASSPHRASE: &str = "TetheringPassphrase";
    pub const IPV4_CONFIGURATION: &str = "IPv4.Configuration";
    pub const NAMESERVERS_CONFIGURATION: &str = "Nameservers.Configuration";
}

/// Keys of the `IPv4.Configuration` dictionary.
pub mod ipv4 {
    pub const METHOD: &str = "Method";
    pub const ADDRESS: &str = "Address";
    pub const NETMASK: &str = "Netmask";
    pub const GATEWAY: &str = "Gateway";

    /// Address used when a manual configuration omits one.
    pub const FALLBACK_ADDRESS: &str = "10.74.11.15";
    /// Netmask used when a manual configuration omits one.
    pub const FALLBACK_NETMASK: &str = "255.0.0.0";
}

/// D-Bus error names with special handling.
pub mod error_name {
    /// Returned by the bus daemon when nothing owns `net.connman`.
    pub const SERVICE_UNKNOWN: &str = "org.freedesktop.DBus.Error.ServiceUnknown";
}

/// Timeout defaults.
///
/// Every remote call carries an explicit budget; scanning and connecting get
/// a longer one because the daemon answers them only after radio work.
pub mod timeouts {
    use std::time::Duration;

    /// Budget for ordinary method calls (10 seconds).
    const DEFAULT_TIMEOUT_SECS: u64 = 10;

    /// Budget for `Scan` (30 seconds).
    const SCAN_TIMEOUT_SECS: u64 = 30;

    /// Budget for `Connect` and for the state transition that follows it (30 seconds).
    const CONNECT_TIMEOUT_SECS: u64 = 30;

    /// Returns the default method call timeout.
    pub fn default_timeout() -> Duration {
        Duration::from_secs(DEFAULT_TIMEOUT_SECS)
    }

    /// Returns the scan timeout.
    pub fn scan_timeout() -> Duration {
        Duration::from_secs(SCAN_TIMEOUT_SECS)
    }

    /// Returns the connect timeout.
    pub fn connect_timeout() -> Duration {
        Duration::from_secs(CONNECT_TIMEOUT_SECS)
    }
}

/// Capacity of the broadcast channels that fan events out to receivers.
///
/// A receiver that falls further behind than this loses the oldest events.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;
