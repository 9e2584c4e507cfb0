//! Service handles.
//!
//! A service handle binds at most one `net.connman.Service` object at a time.
//! The behaviour shared by every service type lives in [`ServiceBase`]; the
//! typed handles add what only their type supports:
//!
//! | Handle               | Extra operations        |
//! |----------------------|-------------------------|
//! | [`WiredService`]     | `set_configuration`     |
//! | [`WifiService`]      | `remove`                |
//! | [`BluetoothService`] | none                    |
//!
//! [`ServiceHandle`] is the closed set of handles the manager resolves to.
//!
//! A handle refers to its technology weakly. Once the technology is
//! retracted by the daemon, or the last [`ConnectionManager`] clone is
//! dropped, operations that need it fail with `TechnologyNotFound`.
//!
//! [`ConnectionManager`]: crate::ConnectionManager

use log::{debug, info, warn};
use std::net::{IpAddr, Ipv4Addr};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};

use crate::Result;
use crate::api::agent::AgentHandle;
use crate::api::models::{
    ConnmanError, Ipv4Config, Ipv4Method, PropertyMap, PropertyValue, Service, TechnologyType,
    TimeoutConfig, WiredConfig,
};
use crate::api::technology::Technology;
use crate::core::binding::ServiceBinding;
use crate::core::pending::{ConnectOutcome, is_connected_value, resolve_once};
use crate::core::services;
use crate::dbus::{Bus, Call, invoke};
use crate::monitoring::property_bus::PropertyEvents;
use crate::types::constants::{ipv4, method, property};

/// Behaviour shared by all service handles.
///
/// State machine: unbound, bound (after [`select`](Self::select)), then
/// connecting and connected or failed as the daemon reports `State`
/// changes. Rebinding or removal returns to unbound.
#[derive(Debug)]
pub struct ServiceBase {
    binding: ServiceBinding,
    kind: TechnologyType,
    technology: Weak<Technology>,
    agent: AgentHandle,
    timeouts: TimeoutConfig,
}

impl ServiceBase {
    pub(crate) fn new(
        bus: Arc<dyn Bus>,
        technology: &Arc<Technology>,
        agent: AgentHandle,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            binding: ServiceBinding::new(bus),
            kind: technology.kind(),
            technology: Arc::downgrade(technology),
            agent,
            timeouts,
        }
    }

    /// Technology type of the handle.
    pub fn kind(&self) -> TechnologyType {
        self.kind
    }

    /// The technology the handle belongs to, while it is still registered.
    pub fn technology(&self) -> Result<Arc<Technology>> {
        self.technology
            .upgrade()
            .ok_or_else(|| ConnmanError::TechnologyNotFound(self.kind.to_string()))
    }

    /// Object path of the bound service.
    pub fn path(&self) -> Option<&str> {
        self.binding.path()
    }

    pub fn is_bound(&self) -> bool {
        self.binding.path().is_some()
    }

    /// Returns true while `PropertyChanged` events are being delivered.
    pub fn is_subscribed(&self) -> bool {
        self.binding.is_subscribed()
    }

    /// Property changes of the bound service.
    ///
    /// The receiver follows the handle across rebinds and never yields an
    /// event of a previous binding once [`select`](Self::select) has returned.
    pub fn events(&self) -> PropertyEvents {
        self.binding.events()
    }

    /// Binds the handle to the service at `path`, replacing any current binding.
    ///
    /// Fails with `ServiceNotFound` if the object cannot be bound, in which
    /// case the previous binding is kept. Selecting the bound path again
    /// changes nothing and keeps pending events.
    pub async fn select(&mut self, path: &str) -> Result<()> {
        self.binding.select(path).await
    }

    pub async fn get_properties(&self) -> Result<PropertyMap> {
        let object = self.binding.object()?;
        services::get_properties(object.as_ref(), self.timeouts.default_timeout).await
    }

    pub async fn set_property(&self, name: &str, value: impl Into<PropertyValue>) -> Result<()> {
        let object = self.binding.object()?;
        services::set_property(
            object.as_ref(),
            name,
            value.into(),
            self.timeouts.default_timeout,
        )
        .await
    }

    pub async fn set_auto_connect(&self, enabled: bool) -> Result<()> {
        self.set_property(property::AUTO_CONNECT, enabled).await
    }

    /// Current record of the bound service.
    pub async fn service(&self) -> Result<Service> {
        let object = self.binding.object()?;
        let properties =
            services::get_properties(object.as_ref(), self.timeouts.default_timeout).await?;
        Ok(Service::new(object.path(), properties))
    }

    /// Selects the access point named `target` within the technology.
    async fn select_target(&mut self, target: Option<&str>) -> Result<()> {
        let Some(name) = target else {
            return Ok(());
        };
        let service = self
            .technology()?
            .find_access_point(name, None)
            .await?
            .ok_or_else(|| ConnmanError::NoSuchAccessPoint(name.to_string()))?;
        self.binding.select(&service.path).await.map_err(|e| {
            warn!("Cannot select {name}: {e}");
            ConnmanError::NoSuchAccessPoint(name.to_string())
        })
    }

    /// Issues `Connect` on the bound service.
    ///
    /// With `target`, the access point of that name is looked up in the
    /// technology and selected first; `NoSuchAccessPoint` is returned and no
    /// `Connect` is sent if there is none. Without a target and without a
    /// binding there is nothing to connect and `Ok(None)` is returned.
    ///
    /// Returns once the daemon has accepted the request; progress is
    /// reported through [`events`](Self::events). The `PropertyChanged`
    /// subscription is re-established if an earlier `disconnect` dropped it.
    pub async fn connect(&mut self, target: Option<&str>) -> Result<Option<AgentHandle>> {
        self.select_target(target).await?;
        let object = match self.binding.object() {
            Ok(object) => Arc::clone(object),
            Err(_) => {
                debug!("No service selected, nothing to connect");
                return Ok(None);
            }
        };

        self.binding.ensure_subscribed().await?;
        invoke(object.as_ref(), Call::Connect, self.timeouts.connect_timeout).await?;
        debug!("Connect accepted by {}", object.path());
        Ok(Some(self.agent.clone()))
    }

    /// Connects and waits until the service is `ready` or `online`.
    ///
    /// Resolves once both the `Connect` reply and the terminal `State` change
    /// have arrived, in whichever order. `State=failure` yields
    /// `ConnectFailed` carrying the service's `Error` property. A service that
    /// is already connected returns immediately without a `Connect` call.
    ///
    /// The terminal `State` is read from the handle's event channel. If the
    /// service emits more than 64 changes before this task gets to them, the
    /// `State` change can be among those dropped and the call ends in
    /// `Timeout`.
    pub async fn connect_and_wait(&mut self, target: Option<&str>) -> Result<AgentHandle> {
        self.select_target(target).await?;
        let object = Arc::clone(self.binding.object()?);

        // Subscribe FIRST so the terminal state cannot slip past.
        self.binding.ensure_subscribed().await?;
        let events = self.binding.events();

        let current =
            services::get_properties(object.as_ref(), self.timeouts.default_timeout).await?;
        if is_connected_value(current.get(property::STATE)) {
            debug!("{} already connected", object.path());
            return Ok(self.agent.clone());
        }

        let timeout = self.timeouts.connect_timeout;
        let ack = async { invoke(object.as_ref(), Call::Connect, timeout).await.map(|_| ()) };
        let mut outcome = ConnectOutcome::default();
        resolve_once(
            ack,
            events.into_stream(),
            |change| outcome.observe(change),
            timeout,
            method::CONNECT,
        )
        .await?;

        info!("Connected to {}", object.path());
        Ok(self.agent.clone())
    }

    /// Issues `Disconnect` and stops delivering property changes.
    ///
    /// A no-op when nothing is bound. The handle stays bound.
    pub async fn disconnect(&mut self) -> Result<()> {
        let object = match self.binding.object() {
            Ok(object) => Arc::clone(object),
            Err(_) => return Ok(()),
        };
        invoke(
            object.as_ref(),
            Call::Disconnect,
            self.timeouts.default_timeout,
        )
        .await?;
        self.binding.release_subscription();
        info!("Disconnected {}", object.path());
        Ok(())
    }
}

/// Handle to a wired (ethernet) service.
#[derive(Debug)]
pub struct WiredService {
    base: ServiceBase,
}

impl WiredService {
    /// Applies IPv4 and/or nameserver configuration.
    ///
    /// Everything is validated before the first call is made. The IPv4
    /// settings are written as one `IPv4.Configuration` dictionary.
    ///
    /// IPv4 and nameservers are two separate `SetProperty` calls with no
    /// rollback. If the nameserver write fails the IPv4 change stays applied
    /// and the error is `PropertySet` naming `Nameservers.Configuration`. A manual
    /// configuration without address or netmask falls back to
    /// [`WiredConfig::FALLBACK_ADDRESS`] and [`WiredConfig::FALLBACK_NETMASK`],
    /// which is logged every time.
    pub async fn set_configuration(&self, config: &WiredConfig) -> Result<()> {
        let object = self.base.binding.object()?;
        if config.ipv4.is_none() && config.nameservers.is_none() {
            return Err(ConnmanError::InvalidArgument("no configuration".into()));
        }

        let ipv4 = config.ipv4.as_ref().map(ipv4_configuration).transpose()?;
        let nameservers = config
            .nameservers
            .as_deref()
            .map(validate_nameservers)
            .transpose()?;

        let timeout = self.base.timeouts.default_timeout;
        if let Some(ipv4) = ipv4 {
            services::set_property(
                object.as_ref(),
                property::IPV4_CONFIGURATION,
                ipv4.into(),
                timeout,
            )
            .await?;
        }
        if let Some(nameservers) = nameservers {
            services::set_property(
                object.as_ref(),
                property::NAMESERVERS_CONFIGURATION,
                nameservers.into(),
                timeout,
            )
            .await?;
        }
        Ok(())
    }
}

fn ipv4_configuration(config: &Ipv4Config) -> Result<PropertyMap> {
    let mut dict = PropertyMap::new();
    dict.insert(ipv4::METHOD.into(), config.method.as_str().into());

    match config.method {
        Ipv4Method::Dhcp => {
            if config.address.is_some() || config.netmask.is_some() {
                debug!("Ignoring static address fields for dhcp");
            }
        }
        Ipv4Method::Manual => {
            let address = manual_field(
                "address",
                config.address.as_deref(),
                WiredConfig::FALLBACK_ADDRESS,
            )?;
            let netmask = manual_field(
                "netmask",
                config.netmask.as_deref(),
                WiredConfig::FALLBACK_NETMASK,
            )?;
            dict.insert(ipv4::ADDRESS.into(), address.into());
            dict.insert(ipv4::NETMASK.into(), netmask.into());
            if let Some(gateway) = config.gateway.as_deref() {
                parse_ipv4("gateway", gateway)?;
                dict.insert(ipv4::GATEWAY.into(), gateway.into());
            }
        }
    }
    Ok(dict)
}

fn manual_field(field: &str, value: Option<&str>, fallback: &str) -> Result<String> {
    match value {
        Some(value) => {
            parse_ipv4(field, value)?;
            Ok(value.to_string())
        }
        None => {
            warn!("Manual IPv4 configuration has no {field}, using {fallback}");
            Ok(fallback.to_string())
        }
    }
}

fn parse_ipv4(field: &str, value: &str) -> Result<Ipv4Addr> {
    value
        .parse()
        .map_err(|_| ConnmanError::InvalidAddress(format!("{field} '{value}'")))
}

fn validate_nameservers(servers: &[String]) -> Result<Vec<String>> {
    for server in servers {
        server
            .parse::<IpAddr>()
            .map_err(|_| ConnmanError::InvalidAddress(format!("nameserver '{server}'")))?;
    }
    Ok(servers.to_vec())
}

/// Handle to a Wi-Fi service.
#[derive(Debug)]
pub struct WifiService {
    base: ServiceBase,
}

impl WifiService {
    /// Makes the daemon forget the service (credentials, favorite flag).
    ///
    /// Unbinds the handle afterwards. A no-op when nothing is bound.
    pub async fn remove(&mut self) -> Result<()> {
        let object = match self.base.binding.object() {
            Ok(object) => Arc::clone(object),
            Err(_) => return Ok(()),
        };
        invoke(
            object.as_ref(),
            Call::Remove,
            self.base.timeouts.default_timeout,
        )
        .await?;
        self.base.binding.unbind();
        info!("Removed {}", object.path());
        Ok(())
    }
}

/// Handle to a Bluetooth (PAN) service.
#[derive(Debug)]
pub struct BluetoothService {
    base: ServiceBase,
}

macro_rules! deref_base {
    ($($handle:ty),*) => {$(
        impl Deref for $handle {
            type Target = ServiceBase;

            fn deref(&self) -> &ServiceBase {
                &self.base
            }
        }

        impl DerefMut for $handle {
            fn deref_mut(&mut self) -> &mut ServiceBase {
                &mut self.base
            }
        }
    )*};
}

deref_base!(WiredService, WifiService, BluetoothService);

/// A service handle of one of the supported types.
///
/// Dereferences to [`ServiceBase`] for the shared operations; match on it
/// (or use the `as_*` accessors) for type-specific ones.
#[derive(Debug)]
pub enum ServiceHandle {
    Wired(WiredService),
    Wifi(WifiService),
    Bluetooth(BluetoothService),
}

impl ServiceHandle {
    /// Returns true if there is a handle implementation for `kind`.
    pub fn supports(kind: TechnologyType) -> bool {
        matches!(
            kind,
            TechnologyType::Ethernet | TechnologyType::Wifi | TechnologyType::Bluetooth
        )
    }

    /// Creates an unbound handle for services of `kind`.
    ///
    /// Types without a handle implementation are rejected with
    /// `UnsupportedServiceType`.
    pub(crate) fn unbound(
        kind: TechnologyType,
        bus: Arc<dyn Bus>,
        technology: Arc<Technology>,
        agent: AgentHandle,
        timeouts: TimeoutConfig,
    ) -> Result<Self> {
        let base = ServiceBase::new(bus, &technology, agent, timeouts);
        match kind {
            TechnologyType::Ethernet => Ok(Self::Wired(WiredService { base })),
            TechnologyType::Wifi => Ok(Self::Wifi(WifiService { base })),
            TechnologyType::Bluetooth => Ok(Self::Bluetooth(BluetoothService { base })),
            other => Err(ConnmanError::UnsupportedServiceType(other.to_string())),
        }
    }

    pub fn as_wired(&self) -> Option<&WiredService> {
        match self {
            Self::Wired(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_wifi(&self) -> Option<&WifiService> {
        match self {
            Self::Wifi(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_wifi_mut(&mut self) -> Option<&mut WifiService> {
        match self {
            Self::Wifi(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bluetooth(&self) -> Option<&BluetoothService> {
        match self {
            Self::Bluetooth(s) => Some(s),
            _ => None,
        }
    }
}

impl Deref for ServiceHandle {
    type Target = ServiceBase;

    fn deref(&self) -> &ServiceBase {
        match self {
            Self::Wired(s) => &s.base,
            Self::Wifi(s) => &s.base,
            Self::Bluetooth(s) => &s.base,
        }
    }
}

impl DerefMut for ServiceHandle {
    fn deref_mut(&mut self) -> &mut ServiceBase {
        match self {
            Self::Wired(s) => &mut s.base,
            Self::Wifi(s) => &mut s.base,
            Self::Bluetooth(s) => &mut s.base,
        }
    }
}
