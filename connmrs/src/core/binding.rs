//! The per-handle service binding.
//!
//! A binding owns at most one remote service object and at most one
//! `PropertyChanged` subscription for it. Rebinding swaps both without an
//! await point between releasing the old subscription and attaching the new
//! one.

use log::{debug, warn};
use std::sync::Arc;

use crate::Result;
use crate::api::models::ConnmanError;
use crate::dbus::{Bus, Interface, RemoteObject, SignalKind};
use crate::monitoring::property_bus::{PropertyBus, PropertyEvents, Subscription};

#[derive(Debug)]
pub(crate) struct ServiceBinding {
    bus: Arc<dyn Bus>,
    object: Option<Arc<dyn RemoteObject>>,
    subscription: Option<Subscription>,
    events: PropertyBus,
}

impl ServiceBinding {
    pub(crate) fn new(bus: Arc<dyn Bus>) -> Self {
        Self {
            bus,
            object: None,
            subscription: None,
            events: PropertyBus::new(),
        }
    }

    /// Binds to the service at `path`.
    ///
    /// The new object and its signal stream are acquired before anything is
    /// released; if either fails the current binding stays as it was.
    /// Selecting the path that is already bound keeps the live subscription
    /// and the events queued on it.
    pub(crate) async fn select(&mut self, path: &str) -> Result<()> {
        if self.path() == Some(path) {
            debug!("Service {path} already selected");
            return self.ensure_subscribed().await;
        }
        let object = self
            .bus
            .object(path, Interface::Service)
            .await
            .map_err(|e| {
                warn!("Cannot bind service {path}: {e}");
                ConnmanError::ServiceNotFound(path.to_string())
            })?;
        let stream = object.subscribe(SignalKind::PropertyChanged).await?;

        self.subscription = None;
        self.subscription = Some(self.events.attach(path.to_string(), stream));
        self.object = Some(object);
        debug!("Selected service {path}");
        Ok(())
    }

    /// Re-attaches the property subscription if it was released.
    pub(crate) async fn ensure_subscribed(&mut self) -> Result<()> {
        if self.subscription.is_some() {
            return Ok(());
        }
        let object = Arc::clone(self.object()?);
        let stream = object.subscribe(SignalKind::PropertyChanged).await?;
        self.subscription = Some(self.events.attach(object.path().to_string(), stream));
        Ok(())
    }

    /// Stops delivering property changes while staying bound.
    pub(crate) fn release_subscription(&mut self) {
        if self.subscription.take().is_some() {
            self.events.invalidate();
        }
    }

    pub(crate) fn unbind(&mut self) {
        self.release_subscription();
        if let Some(object) = self.object.take() {
            debug!("Released service {}", object.path());
        }
    }

    /// The bound object, or `Unbound`.
    pub(crate) fn object(&self) -> Result<&Arc<dyn RemoteObject>> {
        self.object.as_ref().ok_or(ConnmanError::Unbound)
    }

    pub(crate) fn path(&self) -> Option<&str> {
        self.object.as_ref().map(|o| o.path())
    }

    pub(crate) fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub(crate) fn events(&self) -> PropertyEvents {
        self.events.events()
    }
}
