//! Transport seam between the orchestration layer and the message bus.
//!
//! The rest of the crate talks to daemon objects exclusively through
//! [`Bus`] and [`RemoteObject`]. The production implementation,
//! [`ZbusBus`], uses zbus dynamic proxies on the system bus; tests and
//! embedders can supply their own.

mod zbus_transport;

use async_trait::async_trait;
use futures::stream::BoxStream;
use log::debug;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::Result;
use crate::api::models::{PropertyMap, PropertyValue};
use crate::types::constants::{interface, method, signal};
use crate::util::utils::with_timeout;

pub use zbus_transport::{ZbusBus, ZbusObject};

/// The daemon interfaces this crate binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interface {
    Manager,
    Technology,
    Service,
}

impl Interface {
    /// The D-Bus interface name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Manager => interface::MANAGER,
            Self::Technology => interface::TECHNOLOGY,
            Self::Service => interface::SERVICE,
        }
    }
}

/// A remote method invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetProperties,
    SetProperty(String, PropertyValue),
    GetServices,
    GetTechnologies,
    Scan,
    Connect,
    Disconnect,
    Remove,
}

impl Call {
    /// The remote method name.
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::GetProperties => method::GET_PROPERTIES,
            Self::SetProperty(..) => method::SET_PROPERTY,
            Self::GetServices => method::GET_SERVICES,
            Self::GetTechnologies => method::GET_TECHNOLOGIES,
            Self::Scan => method::SCAN,
            Self::Connect => method::CONNECT,
            Self::Disconnect => method::DISCONNECT,
            Self::Remove => method::REMOVE,
        }
    }
}

/// The decoded result of a [`Call`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Methods without a return value.
    Unit,
    /// `GetProperties`.
    Properties(PropertyMap),
    /// `GetServices` and `GetTechnologies`: object paths with their properties,
    /// in the order the daemon returned them.
    Objects(Vec<(String, PropertyMap)>),
}

/// Signal classes that can be subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    PropertyChanged,
    TechnologyAdded,
    TechnologyRemoved,
    ServicesChanged,
}

impl SignalKind {
    /// The D-Bus member name of the signal.
    pub fn member(self) -> &'static str {
        match self {
            Self::PropertyChanged => signal::PROPERTY_CHANGED,
            Self::TechnologyAdded => signal::TECHNOLOGY_ADDED,
            Self::TechnologyRemoved => signal::TECHNOLOGY_REMOVED,
            Self::ServicesChanged => signal::SERVICES_CHANGED,
        }
    }
}

/// A decoded signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    PropertyChanged {
        name: String,
        value: PropertyValue,
    },
    TechnologyAdded {
        path: String,
        properties: PropertyMap,
    },
    TechnologyRemoved {
        path: String,
    },
    ServicesChanged {
        changed: Vec<(String, PropertyMap)>,
        removed: Vec<String>,
    },
}

/// Stream of decoded signals. Dropping it ends the subscription.
pub type SignalStream = BoxStream<'static, Signal>;

/// One daemon-owned object.
#[async_trait]
pub trait RemoteObject: Debug + Send + Sync {
    /// Object path this proxy is bound to.
    fn path(&self) -> &str;

    /// Invokes a remote method.
    ///
    /// `timeout` is the budget the caller enforces; transports with native
    /// deadlines may forward it. Exactly one result is produced per call.
    async fn invoke(&self, call: Call, timeout: Duration) -> Result<Reply>;

    /// Subscribes to a signal emitted by this object.
    ///
    /// Signals are delivered in the order the daemon emitted them.
    async fn subscribe(&self, kind: SignalKind) -> Result<SignalStream>;
}

/// Factory for remote objects.
#[async_trait]
pub trait Bus: Debug + Send + Sync {
    /// Binds a proxy to the object at `path` implementing `interface`.
    async fn object(&self, path: &str, interface: Interface) -> Result<Arc<dyn RemoteObject>>;
}

/// Invokes `call` on `object`, failing with `Timeout` once `timeout` elapses.
///
/// A reply that arrives after the deadline is discarded.
pub(crate) async fn invoke(
    object: &dyn RemoteObject,
    call: Call,
    timeout: Duration,
) -> Result<Reply> {
    let method = call.method_name();
    debug!("{} {} (timeout {:?})", object.path(), method, timeout);
    with_timeout(object.invoke(call, timeout), timeout, method).await
}
