use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::types::constants::{ipv4, path, property, timeouts};

/// Property dictionary as returned by `GetProperties` and carried in
/// enumeration results.
pub type PropertyMap = HashMap<String, PropertyValue>;

/// An owned property value received from or sent to the daemon.
///
/// Mirrors the subset of D-Bus types ConnMan uses in its property
/// dictionaries. Object paths are represented as strings and structures
/// as lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// A boolean flag such as `Powered` or `AutoConnect`.
    Bool(bool),
    /// A single byte, used for `Strength`.
    Byte(u8),
    /// A signed integer.
    Int(i64),
    /// An unsigned integer.
    UInt(u64),
    /// A floating point number.
    Double(f64),
    /// A string, object path or signature.
    Str(String),
    /// An array or structure.
    List(Vec<PropertyValue>),
    /// A string-keyed dictionary such as `IPv4` or `Ethernet`.
    Dict(PropertyMap),
}

impl PropertyValue {
    /// Returns the string content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean content, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as a byte when it fits.
    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Self::Byte(b) => Some(*b),
            Self::UInt(v) => u8::try_from(*v).ok(),
            Self::Int(v) => u8::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Returns the list content, if this is a list.
    pub fn as_list(&self) -> Option<&[PropertyValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the dictionary content, if this is a dictionary.
    pub fn as_dict(&self) -> Option<&PropertyMap> {
        match self {
            Self::Dict(map) => Some(map),
            _ => None,
        }
    }
}

impl Display for PropertyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Byte(b) => write!(f, "{b}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Dict(map) => {
                let mut keys: Vec<_> = map.keys().collect();
                keys.sort();
                write!(f, "{{")?;
                for (i, key) in keys.into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {}", map[key])?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u8> for PropertyValue {
    fn from(v: u8) -> Self {
        Self::Byte(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(v: Vec<String>) -> Self {
        Self::List(v.into_iter().map(Self::Str).collect())
    }
}

impl From<PropertyMap> for PropertyValue {
    fn from(v: PropertyMap) -> Self {
        Self::Dict(v)
    }
}

/// A class of network transport managed by the daemon.
///
/// The set is closed: type strings the crate does not know are rejected
/// with [`ConnmanError::InvalidArgument`] instead of being mapped to a
/// catch-all variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TechnologyType {
    /// Wired Ethernet.
    Ethernet,
    /// Wi-Fi.
    Wifi,
    /// Bluetooth tethering (PAN).
    Bluetooth,
    /// Cellular modems.
    Cellular,
    /// Wi-Fi peer-to-peer.
    P2p,
    /// USB gadget networking.
    Gadget,
    /// VPN providers.
    Vpn,
}

impl TechnologyType {
    /// All known technology types.
    pub const ALL: [TechnologyType; 7] = [
        Self::Ethernet,
        Self::Wifi,
        Self::Bluetooth,
        Self::Cellular,
        Self::P2p,
        Self::Gadget,
        Self::Vpn,
    ];

    /// The type string used by the daemon.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ethernet => "ethernet",
            Self::Wifi => "wifi",
            Self::Bluetooth => "bluetooth",
            Self::Cellular => "cellular",
            Self::P2p => "p2p",
            Self::Gadget => "gadget",
            Self::Vpn => "vpn",
        }
    }

    /// Object path of the technology object for this type.
    ///
    /// Technology paths are derived from the type; service paths never are.
    pub fn object_path(self) -> String {
        format!("{}/{}", path::TECHNOLOGY_PREFIX, self.as_str())
    }
}

impl FromStr for TechnologyType {
    type Err = ConnmanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ConnmanError::InvalidArgument(format!("unknown technology type '{s}'")))
    }
}

impl Display for TechnologyType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection state of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    /// Not connected and not trying to.
    Idle,
    /// The last connection attempt failed.
    Failure,
    /// Associating with the access point or link.
    Association,
    /// Acquiring an IP configuration.
    Configuration,
    /// Connected, internet reachability not confirmed.
    Ready,
    /// Connected and online.
    Online,
    /// Tearing the connection down.
    Disconnect,
}

impl ServiceState {
    /// Returns true for `ready` and `online`.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Ready | Self::Online)
    }

    /// Returns true for `failure`, which ends a connection attempt.
    pub fn is_terminal_failure(self) -> bool {
        self == Self::Failure
    }

    /// Returns true while a connection attempt is in progress.
    pub fn is_connecting(self) -> bool {
        matches!(self, Self::Association | Self::Configuration)
    }

    /// The state string used by the daemon.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Failure => "failure",
            Self::Association => "association",
            Self::Configuration => "configuration",
            Self::Ready => "ready",
            Self::Online => "online",
            Self::Disconnect => "disconnect",
        }
    }
}

impl FromStr for ServiceState {
    type Err = ConnmanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "failure" => Ok(Self::Failure),
            "association" => Ok(Self::Association),
            "configuration" => Ok(Self::Configuration),
            "ready" => Ok(Self::Ready),
            "online" => Ok(Self::Online),
            "disconnect" => Ok(Self::Disconnect),
            other => Err(ConnmanError::InvalidArgument(format!(
                "unknown service state '{other}'"
            ))),
        }
    }
}

impl Display for ServiceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A service as reported by the daemon's enumeration.
///
/// This is a snapshot; it is not updated when the daemon's view changes.
/// To act on a service, resolve it into a handle with
/// [`ConnectionManager::resolve_service`](crate::ConnectionManager::resolve_service).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Object path exactly as supplied by the daemon.
    pub path: String,
    /// All properties reported for the service.
    pub properties: PropertyMap,
}

impl Service {
    pub fn new(path: impl Into<String>, properties: PropertyMap) -> Self {
        Self {
            path: path.into(),
            properties,
        }
    }

    /// The service identifier (last path segment, e.g. `wifi_aabbcc_managed_psk`).
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Returns true if `key` names this service, either by full path or by identifier.
    pub fn is_identified_by(&self, key: &str) -> bool {
        self.path == key || self.id() == key
    }

    /// Looks up a raw property.
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Display name (SSID for Wi-Fi). Hidden networks have none.
    pub fn name(&self) -> Option<&str> {
        self.property(property::NAME).and_then(PropertyValue::as_str)
    }

    /// The raw `Type` string.
    pub fn raw_type(&self) -> Option<&str> {
        self.property(property::TYPE).and_then(PropertyValue::as_str)
    }

    /// The technology type of the service.
    ///
    /// Fails with `InvalidArgument` when the type is missing or unknown.
    pub fn service_type(&self) -> Result<TechnologyType, ConnmanError> {
        match self.raw_type() {
            Some(t) => t.parse(),
            None => Err(ConnmanError::InvalidArgument(format!(
                "service '{}' has no type",
                self.id()
            ))),
        }
    }

    /// Current connection state, if reported and known.
    pub fn state(&self) -> Option<ServiceState> {
        self.property(property::STATE)
            .and_then(PropertyValue::as_str)
            .and_then(|s| s.parse().ok())
    }

    /// Security methods (`none`, `wep`, `psk`, `ieee8021x`, `wps`).
    pub fn security(&self) -> Vec<String> {
        self.property(property::SECURITY)
            .and_then(PropertyValue::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(PropertyValue::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Signal strength in percent, for wireless services.
    pub fn strength(&self) -> Option<u8> {
        self.property(property::STRENGTH).and_then(PropertyValue::as_u8)
    }

    pub fn favorite(&self) -> bool {
        self.flag(property::FAVORITE)
    }

    pub fn immutable(&self) -> bool {
        self.flag(property::IMMUTABLE)
    }

    pub fn auto_connect(&self) -> bool {
        self.flag(property::AUTO_CONNECT)
    }

    /// Kernel interface name from the `Ethernet` dictionary.
    pub fn interface(&self) -> Option<&str> {
        self.property(property::ETHERNET)
            .and_then(PropertyValue::as_dict)
            .and_then(|eth| eth.get(property::INTERFACE))
            .and_then(PropertyValue::as_str)
    }

    /// Error reported for the last failed connection attempt.
    pub fn error(&self) -> Option<&str> {
        self.property(property::ERROR).and_then(PropertyValue::as_str)
    }

    fn flag(&self, name: &str) -> bool {
        self.property(name)
            .and_then(PropertyValue::as_bool)
            .unwrap_or(false)
    }
}

impl Display for Service {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}, {})",
            self.name().unwrap_or("<hidden>"),
            self.raw_type().unwrap_or("unknown"),
            self.state().map_or("unknown", ServiceState::as_str)
        )
    }
}

/// A technology as reported by `GetTechnologies`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologyInfo {
    /// Object path of the technology.
    pub path: String,
    /// All properties reported for the technology.
    pub properties: PropertyMap,
}

impl TechnologyInfo {
    /// Human readable name (`WiFi`, `Wired`, ...).
    pub fn name(&self) -> Option<&str> {
        self.properties
            .get(property::NAME)
            .and_then(PropertyValue::as_str)
    }

    /// The technology type; falls back to the last path segment when the
    /// `Type` property is missing.
    pub fn technology_type(&self) -> Result<TechnologyType, ConnmanError> {
        match self
            .properties
            .get(property::TYPE)
            .and_then(PropertyValue::as_str)
        {
            Some(t) => t.parse(),
            None => self.path.rsplit('/').next().unwrap_or_default().parse(),
        }
    }

    pub fn powered(&self) -> bool {
        self.flag(property::POWERED)
    }

    pub fn connected(&self) -> bool {
        self.flag(property::CONNECTED)
    }

    pub fn tethering(&self) -> bool {
        self.flag(property::TETHERING)
    }

    fn flag(&self, name: &str) -> bool {
        self.properties
            .get(name)
            .and_then(PropertyValue::as_bool)
            .unwrap_or(false)
    }
}

/// IPv4 configuration method for wired services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ipv4Method {
    /// Static address.
    Manual,
    /// Address obtained through DHCP.
    Dhcp,
}

impl Ipv4Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Dhcp => "dhcp",
        }
    }
}

impl FromStr for Ipv4Method {
    type Err = ConnmanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "dhcp" => Ok(Self::Dhcp),
            other => Err(ConnmanError::InvalidArgument(format!(
                "unknown method '{other}'"
            ))),
        }
    }
}

/// IPv4 settings applied through `IPv4.Configuration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Config {
    pub method: Ipv4Method,
    pub address: Option<String>,
    pub netmask: Option<String>,
    pub gateway: Option<String>,
}

impl Ipv4Config {
    /// DHCP configuration.
    pub fn dhcp() -> Self {
        Self {
            method: Ipv4Method::Dhcp,
            address: None,
            netmask: None,
            gateway: None,
        }
    }

    /// Static configuration with the given address and netmask.
    pub fn manual(address: impl Into<String>, netmask: impl Into<String>) -> Self {
        Self {
            method: Ipv4Method::Manual,
            address: Some(address.into()),
            netmask: Some(netmask.into()),
            gateway: None,
        }
    }

    #[must_use]
    pub fn with_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = Some(gateway.into());
        self
    }
}

/// Configuration for a wired service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiredConfig {
    pub ipv4: Option<Ipv4Config>,
    pub nameservers: Option<Vec<String>>,
}

impl WiredConfig {
    /// Address and netmask used for a manual configuration that omits them.
    pub const FALLBACK_ADDRESS: &'static str = ipv4::FALLBACK_ADDRESS;
    pub const FALLBACK_NETMASK: &'static str = ipv4::FALLBACK_NETMASK;
}

/// A property change observed on a bound remote object.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChange {
    /// Property name, e.g. `State`.
    pub name: String,
    /// New value.
    pub value: PropertyValue,
    /// Object path of the object that emitted the change.
    pub source: String,
    /// Delivery order; increases monotonically per handle.
    pub seq: u64,
    pub(crate) generation: u64,
}

/// Manager-level notifications re-emitted to the application.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerEvent {
    /// A global property such as `State` or `OfflineMode` changed.
    PropertyChanged { name: String, value: PropertyValue },
    /// A technology appeared.
    ///
    /// When the type is known and could be bound, the registry already
    /// contains it when this is delivered.
    TechnologyAdded {
        technology: TechnologyInfo,
    },
    /// A technology disappeared; the registry no longer contains it.
    TechnologyRemoved { path: String },
    /// Services were added, changed or removed.
    ServicesChanged {
        changed: Vec<Service>,
        removed: Vec<String>,
    },
}

/// Timeout configuration for remote calls.
///
/// # Example
///
/// ```rust
/// use connmrs::TimeoutConfig;
/// use std::time::Duration;
///
/// let config = TimeoutConfig::new()
///     .with_scan_timeout(Duration::from_secs(45))
///     .with_connect_timeout(Duration::from_secs(60));
/// assert_eq!(config.default_timeout, Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Budget for ordinary method calls.
    pub default_timeout: Duration,
    /// Budget for technology scans.
    pub scan_timeout: Duration,
    /// Budget for `Connect` and for waiting on the resulting state change.
    pub connect_timeout: Duration,
}

impl TimeoutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_timeout: timeouts::default_timeout(),
            scan_timeout: timeouts::scan_timeout(),
            connect_timeout: timeouts::connect_timeout(),
        }
    }
}

/// Errors returned by connmrs operations.
#[derive(Debug, Error)]
pub enum ConnmanError {
    /// A D-Bus communication error occurred.
    #[error("D-Bus error: {0}")]
    Dbus(#[from] zbus::Error),

    /// The daemon's manager object could not be reached.
    #[error("cannot connect to connection manager: {0}")]
    Unreachable(String),

    /// A remote call exceeded its budget.
    #[error("{method} timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },

    /// No service with the given identifier exists.
    #[error("no such service: {0}")]
    ServiceNotFound(String),

    /// The technology is not known to the daemon.
    #[error("no such technology: {0}")]
    TechnologyNotFound(String),

    /// No access point with the given name is visible on the technology.
    #[error("no such access point: {0}")]
    NoSuchAccessPoint(String),

    /// A query matched no service.
    #[error("no service matches the query")]
    NoMatchingService,

    /// The operation needs a selected service and none is bound.
    #[error("no service is selected")]
    Unbound,

    /// Malformed argument or configuration.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The service type has no handle implementation.
    #[error("no suitable interface found for '{0}'")]
    UnsupportedServiceType(String),

    /// Invalid IPv4 address or netmask.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The daemon returned an error; name and message are passed through verbatim.
    #[error("{name}: {message}")]
    Remote { name: String, message: String },

    /// Setting a property failed.
    #[error("failed to set {property}: {source}")]
    PropertySet {
        property: String,
        source: Box<ConnmanError>,
    },

    /// The service reached the `failure` state while connecting.
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// The daemon answered with a reply of the wrong shape.
    #[error("unexpected reply to {0}")]
    UnexpectedReply(String),

    /// A signal stream ended while an operation was waiting on it.
    #[error("signal stream ended: {0}")]
    Stuck(String),
}

impl ConnmanError {
    /// Returns the daemon error name, for errors that carry one.
    ///
    /// Looks through `PropertySet` wrappers.
    pub fn remote_name(&self) -> Option<&str> {
        match self {
            Self::Remote { name, .. } => Some(name),
            Self::PropertySet { source, .. } => source.remote_name(),
            _ => None,
        }
    }

    /// Returns the property whose `SetProperty` failed, if any.
    pub fn failed_property(&self) -> Option<&str> {
        match self {
            Self::PropertySet { property, .. } => Some(property),
            _ => None,
        }
    }
}
