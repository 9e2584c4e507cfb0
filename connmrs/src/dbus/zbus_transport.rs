//! zbus-backed transport.
//!
//! ConnMan does not use `org.freedesktop.DBus.Properties`; everything goes
//! through `GetProperties`/`SetProperty` and `PropertyChanged`, so dynamic
//! proxies are used rather than generated ones.

use async_trait::async_trait;
use futures::{StreamExt, future};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use zbus::{Connection, Message, Proxy};
use zvariant::{OwnedObjectPath, OwnedValue};

use super::{Bus, Call, Interface, RemoteObject, Reply, Signal, SignalKind, SignalStream};
use crate::Result;
use crate::api::models::{ConnmanError, PropertyMap};
use crate::try_log;
use crate::types::constants::SERVICE_NAME;
use crate::util::utils::{from_dbus_map, from_dbus_value, to_dbus_value};

type ObjectList = Vec<(OwnedObjectPath, HashMap<String, OwnedValue>)>;

/// [`Bus`] implementation over a zbus connection.
#[derive(Debug, Clone)]
pub struct ZbusBus {
    conn: Connection,
}

impl ZbusBus {
    /// Connects to the system bus, where `connmand` runs.
    pub async fn system() -> Result<Self> {
        let conn = Connection::system().await?;
        Ok(Self { conn })
    }

    /// Connects to the session bus.
    pub async fn session() -> Result<Self> {
        let conn = Connection::session().await?;
        Ok(Self { conn })
    }

    /// Wraps an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[async_trait]
impl Bus for ZbusBus {
    async fn object(&self, path: &str, interface: Interface) -> Result<Arc<dyn RemoteObject>> {
        let proxy = Proxy::new(&self.conn, SERVICE_NAME, path.to_string(), interface.name()).await?;
        debug!("Bound {} at {path}", interface.name());
        Ok(Arc::new(ZbusObject {
            path: path.to_string(),
            proxy,
        }))
    }
}

/// [`RemoteObject`] implementation over a zbus dynamic proxy.
#[derive(Debug, Clone)]
pub struct ZbusObject {
    path: String,
    proxy: Proxy<'static>,
}

#[async_trait]
impl RemoteObject for ZbusObject {
    fn path(&self) -> &str {
        &self.path
    }

    async fn invoke(&self, call: Call, _timeout: Duration) -> Result<Reply> {
        let method = call.method_name();
        let reply = match &call {
            Call::SetProperty(name, value) => {
                self.proxy
                    .call_method(method, &(name.as_str(), to_dbus_value(value)))
                    .await
            }
            _ => self.proxy.call_method(method, &()).await,
        }
        .map_err(remote_error)?;

        decode_reply(&call, &reply)
    }

    async fn subscribe(&self, kind: SignalKind) -> Result<SignalStream> {
        let stream = self.proxy.receive_signal(kind.member()).await?;
        debug!("Subscribed to {} on {}", kind.member(), self.path);

        let source = self.path.clone();
        Ok(stream
            .filter_map(move |msg| future::ready(decode_signal(kind, &msg, &source)))
            .boxed())
    }
}

/// Maps daemon method errors to `ConnmanError::Remote`, keeping name and text verbatim.
fn remote_error(err: zbus::Error) -> ConnmanError {
    match err {
        zbus::Error::MethodError(name, detail, _) => ConnmanError::Remote {
            name: name.as_str().to_owned(),
            message: detail.unwrap_or_default(),
        },
        other => ConnmanError::Dbus(other),
    }
}

fn decode_reply(call: &Call, msg: &Message) -> Result<Reply> {
    let body = msg.body();
    match call {
        Call::GetProperties => {
            let props = body.deserialize::<HashMap<String, OwnedValue>>()?;
            Ok(Reply::Properties(from_dbus_map(props)?))
        }
        Call::GetServices | Call::GetTechnologies => {
            let objects = body.deserialize::<ObjectList>()?;
            Ok(Reply::Objects(decode_objects(objects)?))
        }
        _ => Ok(Reply::Unit),
    }
}

fn decode_objects(objects: ObjectList) -> Result<Vec<(String, PropertyMap)>> {
    objects
        .into_iter()
        .map(|(path, props)| Ok((path.as_str().to_owned(), from_dbus_map(props)?)))
        .collect()
}

/// Decodes a signal message. Undecodable messages are logged and skipped.
fn decode_signal(kind: SignalKind, msg: &Message, source: &str) -> Option<Signal> {
    let body = msg.body();
    let context = format!("Failed to decode {} from {source}", kind.member());

    let signal = match kind {
        SignalKind::PropertyChanged => {
            let (name, value) = try_log!(body.deserialize::<(String, OwnedValue)>(), context);
            let value = try_log!(from_dbus_value(&value), context);
            Signal::PropertyChanged { name, value }
        }
        SignalKind::TechnologyAdded => {
            let (path, props) = try_log!(
                body.deserialize::<(OwnedObjectPath, HashMap<String, OwnedValue>)>(),
                context
            );
            Signal::TechnologyAdded {
                path: path.as_str().to_owned(),
                properties: try_log!(from_dbus_map(props), context),
            }
        }
        SignalKind::TechnologyRemoved => {
            let path = try_log!(body.deserialize::<OwnedObjectPath>(), context);
            Signal::TechnologyRemoved {
                path: path.as_str().to_owned(),
            }
        }
        SignalKind::ServicesChanged => {
            let (changed, removed) = try_log!(
                body.deserialize::<(ObjectList, Vec<OwnedObjectPath>)>(),
                context
            );
            Signal::ServicesChanged {
                changed: try_log!(decode_objects(changed), context),
                removed: removed.iter().map(|p| p.as_str().to_owned()).collect(),
            }
        }
    };

    debug!("{} from {source}", kind.member());
    Some(signal)
}
