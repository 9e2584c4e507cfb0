//! Technology handles.
//!
//! A [`Technology`] is bound to `/net/connman/technology/<type>` for its whole
//! life and is owned (`Arc`) by the manager's registry. Service handles of
//! that type hold it weakly.

use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Result;
use crate::api::models::{
    ConnmanError, PropertyMap, PropertyValue, Service, TechnologyInfo, TechnologyType,
    TimeoutConfig,
};
use crate::api::query::Query;
use crate::core::services;
use crate::dbus::{Bus, Call, Interface, RemoteObject, SignalKind, invoke};
use crate::monitoring::property_bus::{PropertyBus, PropertyEvents, Subscription};
use crate::types::constants::property;

/// Technologies known to a manager, keyed by type.
pub(crate) type TechnologyRegistry = Arc<RwLock<HashMap<TechnologyType, Arc<Technology>>>>;

/// Handle to one technology object.
#[derive(Debug)]
pub struct Technology {
    kind: TechnologyType,
    object: Arc<dyn RemoteObject>,
    manager: Arc<dyn RemoteObject>,
    timeouts: TimeoutConfig,
    events: PropertyBus,
    _subscription: Subscription,
}

impl Technology {
    /// Binds the technology object for `kind` and subscribes to its
    /// `PropertyChanged` signal.
    pub(crate) async fn bind(
        bus: &dyn Bus,
        manager: Arc<dyn RemoteObject>,
        kind: TechnologyType,
        timeouts: TimeoutConfig,
    ) -> Result<Self> {
        let path = kind.object_path();
        let object = bus.object(&path, Interface::Technology).await?;
        let stream = object.subscribe(SignalKind::PropertyChanged).await?;

        let events = PropertyBus::new();
        let subscription = events.attach(path, stream);
        debug!("Bound technology {kind}");

        Ok(Self {
            kind,
            object,
            manager,
            timeouts,
            events,
            _subscription: subscription,
        })
    }

    pub fn kind(&self) -> TechnologyType {
        self.kind
    }

    /// Object path, always `/net/connman/technology/<type>`.
    pub fn path(&self) -> &str {
        self.object.path()
    }

    /// Property changes on the technology object.
    pub fn events(&self) -> PropertyEvents {
        self.events.events()
    }

    pub async fn get_properties(&self) -> Result<PropertyMap> {
        services::get_properties(self.object.as_ref(), self.timeouts.default_timeout).await
    }

    pub async fn set_property(&self, name: &str, value: impl Into<PropertyValue>) -> Result<()> {
        services::set_property(
            self.object.as_ref(),
            name,
            value.into(),
            self.timeouts.default_timeout,
        )
        .await
    }

    /// Current properties as a [`TechnologyInfo`] record.
    pub async fn info(&self) -> Result<TechnologyInfo> {
        Ok(TechnologyInfo {
            path: self.path().to_string(),
            properties: self.get_properties().await?,
        })
    }

    /// Powers the technology's devices on or off.
    pub async fn set_powered(&self, powered: bool) -> Result<()> {
        self.set_property(property::POWERED, powered).await
    }

    /// Triggers a scan and waits for the daemon to finish it.
    ///
    /// Uses the scan timeout (30 seconds by default). A refusal such as
    /// `net.connman.Error.InProgress` is returned verbatim.
    pub async fn scan(&self) -> Result<()> {
        invoke(self.object.as_ref(), Call::Scan, self.timeouts.scan_timeout).await?;
        debug!("Scan on {} finished", self.kind);
        Ok(())
    }

    /// Services of this technology's type, in daemon order.
    pub async fn services(&self) -> Result<Vec<Service>> {
        services::list_services(
            self.manager.as_ref(),
            Some(self.kind),
            self.timeouts.default_timeout,
        )
        .await
    }

    /// Finds an access point by display name.
    ///
    /// With `interface`, only services on that network interface are
    /// considered. The first match in daemon order wins; names are not
    /// guaranteed unique.
    pub async fn find_access_point(
        &self,
        name: &str,
        interface: Option<&str>,
    ) -> Result<Option<Service>> {
        let found = self.services().await?.into_iter().find(|s| {
            interface.is_none_or(|iface| s.interface() == Some(iface)) && s.name() == Some(name)
        });
        if found.is_none() {
            debug!("No access point named {name} on {}", self.kind);
        }
        Ok(found)
    }

    /// First service of this type matching `query`.
    pub async fn search_service(&self, query: &Query) -> Result<Service> {
        let services = self.services().await?;
        query
            .first_match(&services)
            .cloned()
            .ok_or(ConnmanError::NoMatchingService)
    }

    /// Enables tethering.
    ///
    /// Runs three separate calls in order: set `TetheringIdentifier` (when
    /// `ssid` is given), set `TetheringPassphrase` (when `passphrase` is
    /// given), set `Tethering` to true. The first failure aborts the
    /// sequence and is returned as `PropertySet` naming the failed property.
    /// Steps that already succeeded are not undone.
    pub async fn enable_tethering(&self, ssid: Option<&str>, passphrase: Option<&str>) -> Result<()> {
        if let Some(ssid) = ssid {
            self.set_property(property::TETHERING_IDENTIFIER, ssid)
                .await?;
        }
        if let Some(passphrase) = passphrase {
            self.set_property(property::TETHERING_PASSPHRASE, passphrase)
                .await?;
        }
        self.set_property(property::TETHERING, true).await?;
        info!("Tethering enabled on {}", self.kind);
        Ok(())
    }

    pub async fn disable_tethering(&self) -> Result<()> {
        self.set_property(property::TETHERING, false).await?;
        info!("Tethering disabled on {}", self.kind);
        Ok(())
    }
}

/// Returns the registered technology for `kind`, binding it on first sight.
///
/// The lock is not held while binding. If another task registered the same
/// type meanwhile, its handle is kept and returned.
pub(crate) async fn register_technology(
    registry: &TechnologyRegistry,
    bus: &dyn Bus,
    manager: &Arc<dyn RemoteObject>,
    kind: TechnologyType,
    timeouts: TimeoutConfig,
) -> Result<Arc<Technology>> {
    if let Some(existing) = registry.read().await.get(&kind) {
        return Ok(Arc::clone(existing));
    }

    let technology = Arc::new(Technology::bind(bus, Arc::clone(manager), kind, timeouts).await?);
    let mut guard = registry.write().await;
    let entry = guard.entry(kind).or_insert(technology);
    debug!("Registered technology {kind}");
    Ok(Arc::clone(entry))
}

/// Drops the technology at `path` from the registry.
pub(crate) async fn unregister_technology(registry: &TechnologyRegistry, path: &str) {
    registry.write().await.retain(|kind, technology| {
        let keep = technology.path() != path;
        if !keep {
            debug!("Unregistered technology {kind}");
        }
        keep
    });
}
