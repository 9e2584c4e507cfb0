//! Manager-level signal handling.
//!
//! Merges the manager object's signal streams, keeps the technology registry
//! in step with `TechnologyAdded`/`TechnologyRemoved`, and re-emits every
//! signal as a [`ManagerEvent`]. The registry is updated before the event is
//! sent, so receivers observe a registry that already reflects it. A
//! technology of unknown type, or one that cannot be bound, is announced
//! without being registered.

use futures::stream::{self, BoxStream, StreamExt};
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::Result;
use crate::api::models::{ManagerEvent, Service, TechnologyInfo, TimeoutConfig};
use crate::api::technology::{TechnologyRegistry, register_technology, unregister_technology};
use crate::dbus::{Bus, RemoteObject, Signal, SignalKind};
use crate::monitoring::property_bus::Subscription;

/// Signal classes consumed from the manager object.
const MANAGER_SIGNALS: [SignalKind; 4] = [
    SignalKind::PropertyChanged,
    SignalKind::TechnologyAdded,
    SignalKind::TechnologyRemoved,
    SignalKind::ServicesChanged,
];

pub(crate) struct ManagerPump {
    pub(crate) bus: Arc<dyn Bus>,
    pub(crate) manager: Arc<dyn RemoteObject>,
    pub(crate) registry: TechnologyRegistry,
    pub(crate) events: broadcast::Sender<ManagerEvent>,
    pub(crate) timeouts: TimeoutConfig,
}

impl ManagerPump {
    /// Subscribes to every manager signal and starts the pump task.
    ///
    /// All subscriptions are in place when this returns.
    pub(crate) async fn start(self) -> Result<Subscription> {
        let mut streams = Vec::with_capacity(MANAGER_SIGNALS.len());
        for kind in MANAGER_SIGNALS {
            streams.push(self.manager.subscribe(kind).await?);
        }
        debug!("Monitoring {} manager signal streams", streams.len());

        let mut merged = stream::select_all(streams);
        Ok(Subscription::spawn(async move {
            while let Some(signal) = merged.next().await {
                self.dispatch(signal).await;
            }
            warn!("Manager signal streams ended");
        }))
    }

    /// Adds an announced technology to the registry.
    ///
    /// Unknown types and bind failures are logged; the announcement itself
    /// is still re-emitted.
    async fn register(&self, technology: &TechnologyInfo) {
        let kind = match technology.technology_type() {
            Ok(kind) => kind,
            Err(e) => {
                warn!("Not registering technology {}: {e}", technology.path);
                return;
            }
        };
        if let Err(e) = register_technology(
            &self.registry,
            self.bus.as_ref(),
            &self.manager,
            kind,
            self.timeouts,
        )
        .await
        {
            warn!("Failed to bind added technology {kind}: {e}");
        }
    }

    async fn dispatch(&self, signal: Signal) {
        let event = match signal {
            Signal::PropertyChanged { name, value } => {
                debug!("Manager property {name} changed");
                ManagerEvent::PropertyChanged { name, value }
            }
            Signal::TechnologyAdded { path, properties } => {
                let technology = TechnologyInfo { path, properties };
                self.register(&technology).await;
                ManagerEvent::TechnologyAdded { technology }
            }
            Signal::TechnologyRemoved { path } => {
                unregister_technology(&self.registry, &path).await;
                ManagerEvent::TechnologyRemoved { path }
            }
            Signal::ServicesChanged { changed, removed } => ManagerEvent::ServicesChanged {
                changed: changed
                    .into_iter()
                    .map(|(path, props)| Service::new(path, props))
                    .collect(),
                removed,
            },
        };

        if self.events.send(event).is_err() {
            debug!("No receivers for manager event");
        }
    }
}

/// Receiver of [`ManagerEvent`]s.
#[derive(Debug)]
pub struct ManagerEvents {
    receiver: broadcast::Receiver<ManagerEvent>,
}

impl ManagerEvents {
    pub(crate) fn new(receiver: broadcast::Receiver<ManagerEvent>) -> Self {
        Self { receiver }
    }

    /// Waits for the next manager event. Returns `None` once the manager is gone.
    pub async fn next(&mut self) -> Option<ManagerEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(missed)) => {
                    warn!("Manager event receiver lagged, {missed} events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> BoxStream<'static, ManagerEvent> {
        stream::unfold(self, |mut events| async move {
            events.next().await.map(|event| (event, events))
        })
        .boxed()
    }
}
