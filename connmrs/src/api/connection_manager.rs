use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::Result;
use crate::api::agent::{Agent, AgentHandle};
use crate::api::models::{
    ConnmanError, ManagerEvent, PropertyMap, PropertyValue, Service, TechnologyInfo,
    TechnologyType, TimeoutConfig,
};
use crate::api::query::Query;
use crate::api::service::ServiceHandle;
use crate::api::technology::{Technology, TechnologyRegistry, register_technology};
use crate::core::services;
use crate::dbus::{Bus, Interface, RemoteObject, ZbusBus};
use crate::monitoring::manager::{ManagerEvents, ManagerPump};
use crate::monitoring::property_bus::Subscription;
use crate::types::constants::{EVENT_CHANNEL_CAPACITY, error_name, path, property};

/// High-level interface to ConnMan over D-Bus.
///
/// This is the main entry point. It owns the manager object binding, the
/// technology registry and the manager signal pump.
///
/// # Creating an Instance
///
/// ```no_run
/// use connmrs::ConnectionManager;
///
/// # async fn example() -> connmrs::Result<()> {
/// let cm = ConnectionManager::new().await?;
/// for service in cm.list_services(None).await? {
///     println!("{service}");
/// }
/// # Ok(())
/// # }
/// ```
///
/// # Connecting to an access point
///
/// ```no_run
/// use connmrs::{ConnectionManager, TechnologyType};
///
/// # async fn example() -> connmrs::Result<()> {
/// let cm = ConnectionManager::new().await?;
/// let mut wifi = cm.handle(TechnologyType::Wifi).await?;
/// wifi.connect_and_wait(Some("HomeNet")).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Technology registry
///
/// Technologies found during initialization are bound once and kept. The
/// registry follows `TechnologyAdded`/`TechnologyRemoved` from then on; the
/// update is applied before the matching [`ManagerEvent`] is delivered.
///
/// # Thread Safety
///
/// `ConnectionManager` is `Clone`. Clones share the bus, the registry and the
/// signal pump, which stops when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    bus: Arc<dyn Bus>,
    manager: Arc<dyn RemoteObject>,
    registry: TechnologyRegistry,
    events: broadcast::Sender<ManagerEvent>,
    timeouts: TimeoutConfig,
    agent: AgentHandle,
    _pump: Arc<Subscription>,
}

/// Maps bus-level failures of the initial calls to `Unreachable`.
fn unreachable(err: ConnmanError) -> ConnmanError {
    match err {
        ConnmanError::Dbus(e) => ConnmanError::Unreachable(e.to_string()),
        ConnmanError::Remote { name, message } if name == error_name::SERVICE_UNKNOWN => {
            ConnmanError::Unreachable(message)
        }
        other => other,
    }
}

impl ConnectionManager {
    /// Connects to `connmand` on the system bus with default timeouts.
    pub async fn new() -> Result<Self> {
        Self::with_config(TimeoutConfig::default()).await
    }

    /// Connects to `connmand` on the system bus with custom timeouts.
    pub async fn with_config(timeouts: TimeoutConfig) -> Result<Self> {
        let bus = ZbusBus::system().await.map_err(unreachable)?;
        Self::with_bus(Arc::new(bus), timeouts).await
    }

    /// Initializes over a custom transport.
    ///
    /// Binds the manager object, subscribes to `PropertyChanged`,
    /// `TechnologyAdded`, `TechnologyRemoved` and `ServicesChanged`, and
    /// enumerates technologies. Returns only when all of that is done.
    /// Fails with `Unreachable` if the manager object cannot be reached.
    pub async fn with_bus(bus: Arc<dyn Bus>, timeouts: TimeoutConfig) -> Result<Self> {
        let manager = bus
            .object(path::MANAGER, Interface::Manager)
            .await
            .map_err(|e| ConnmanError::Unreachable(e.to_string()))?;

        let registry = TechnologyRegistry::default();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let pump = ManagerPump {
            bus: Arc::clone(&bus),
            manager: Arc::clone(&manager),
            registry: Arc::clone(&registry),
            events: events.clone(),
            timeouts,
        }
        .start()
        .await
        .map_err(unreachable)?;

        let cm = Self {
            bus,
            manager,
            registry,
            events,
            timeouts,
            agent: AgentHandle::default(),
            _pump: Arc::new(pump),
        };

        let count = cm.refresh_technologies().await.map_err(unreachable)?;
        info!("Connected to connman, {count} technologies");
        Ok(cm)
    }

    /// Sets the agent handed out by `connect` on handles created afterwards.
    #[must_use]
    pub fn with_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agent = AgentHandle::new(Some(agent));
        self
    }

    pub fn timeouts(&self) -> TimeoutConfig {
        self.timeouts
    }

    pub fn agent(&self) -> &AgentHandle {
        &self.agent
    }

    /// Manager-level events: property changes, technology and service changes.
    pub fn events(&self) -> ManagerEvents {
        ManagerEvents::new(self.events.subscribe())
    }

    /// Global manager properties (`State`, `OfflineMode`, ...).
    pub async fn get_properties(&self) -> Result<PropertyMap> {
        services::get_properties(self.manager.as_ref(), self.timeouts.default_timeout).await
    }

    pub async fn set_property(&self, name: &str, value: impl Into<PropertyValue>) -> Result<()> {
        services::set_property(
            self.manager.as_ref(),
            name,
            value.into(),
            self.timeouts.default_timeout,
        )
        .await
    }

    /// Turns offline (airplane) mode on or off.
    pub async fn set_offline_mode(&self, enabled: bool) -> Result<()> {
        self.set_property(property::OFFLINE_MODE, enabled).await
    }

    /// Lists services in the order the daemon reports them.
    ///
    /// With `filter`, only services of that type are returned. No services
    /// is an empty list, not an error.
    pub async fn list_services(&self, filter: Option<TechnologyType>) -> Result<Vec<Service>> {
        services::list_services(
            self.manager.as_ref(),
            filter,
            self.timeouts.default_timeout,
        )
        .await
    }

    /// Raw `GetTechnologies` records.
    pub async fn technology_infos(&self) -> Result<Vec<TechnologyInfo>> {
        services::list_technologies(self.manager.as_ref(), self.timeouts.default_timeout).await
    }

    /// Enumerates technologies and binds any not yet registered.
    ///
    /// Unknown technology types are logged and skipped.
    async fn refresh_technologies(&self) -> Result<usize> {
        let infos = self.technology_infos().await?;
        for info in &infos {
            let kind = match info.technology_type() {
                Ok(kind) => kind,
                Err(e) => {
                    warn!("Skipping technology {}: {e}", info.path);
                    continue;
                }
            };
            register_technology(
                &self.registry,
                self.bus.as_ref(),
                &self.manager,
                kind,
                self.timeouts,
            )
            .await?;
        }
        Ok(self.registry.read().await.len())
    }

    /// The current technology registry.
    ///
    /// Enumerates on first use if the registry is empty; otherwise returns
    /// the cached set as kept up to date by add/remove signals.
    pub async fn technologies(&self) -> Result<HashMap<TechnologyType, Arc<Technology>>> {
        if self.registry.read().await.is_empty() {
            self.refresh_technologies().await?;
        }
        Ok(self.registry.read().await.clone())
    }

    /// The handle for one technology.
    ///
    /// Fails with `TechnologyNotFound` if the daemon does not report it.
    pub async fn technology(&self, kind: TechnologyType) -> Result<Arc<Technology>> {
        if let Some(technology) = self.registry.read().await.get(&kind) {
            return Ok(Arc::clone(technology));
        }
        debug!("Technology {kind} not registered, enumerating");
        self.refresh_technologies().await?;
        self.registry
            .read()
            .await
            .get(&kind)
            .cloned()
            .ok_or_else(|| ConnmanError::TechnologyNotFound(kind.to_string()))
    }

    /// Creates an unbound service handle for `kind`.
    ///
    /// Bind it with `select`, or pass a target name to `connect`.
    pub async fn handle(&self, kind: TechnologyType) -> Result<ServiceHandle> {
        if !ServiceHandle::supports(kind) {
            return Err(ConnmanError::UnsupportedServiceType(kind.to_string()));
        }
        let technology = self.technology(kind).await?;
        ServiceHandle::unbound(
            kind,
            Arc::clone(&self.bus),
            technology,
            self.agent.clone(),
            self.timeouts,
        )
    }

    async fn bind_service(&self, service: &Service) -> Result<ServiceHandle> {
        let mut handle = self.handle(service.service_type()?).await?;
        handle.select(&service.path).await?;
        Ok(handle)
    }

    /// Resolves a service by identifier (`wifi_..._managed_psk`) or object path
    /// and returns a handle bound to it.
    ///
    /// Re-enumerates on every call; nothing is cached. Fails with
    /// `ServiceNotFound` carrying `id` if the daemon does not list it.
    pub async fn resolve_service(&self, id: &str) -> Result<ServiceHandle> {
        let service = self
            .list_services(None)
            .await?
            .into_iter()
            .find(|s| s.is_identified_by(id))
            .ok_or_else(|| ConnmanError::ServiceNotFound(id.to_string()))?;
        self.bind_service(&service).await
    }

    /// Finds the first service matching `query`, optionally within one type,
    /// and returns a bound handle together with the matched record.
    ///
    /// Enumeration order is the daemon's and is not guaranteed stable.
    pub async fn search_service(
        &self,
        query: &Query,
        kind: Option<TechnologyType>,
    ) -> Result<(ServiceHandle, Service)> {
        let services = self.list_services(kind).await?;
        let service = query
            .first_match(&services)
            .cloned()
            .ok_or(ConnmanError::NoMatchingService)?;
        let handle = self.bind_service(&service).await?;
        Ok((handle, service))
    }
}
