//! Enumeration and property primitives shared by the handles.

use log::debug;
use std::time::Duration;

use crate::Result;
use crate::api::models::{
    ConnmanError, PropertyMap, PropertyValue, Service, TechnologyInfo, TechnologyType,
};
use crate::dbus::{Call, RemoteObject, Reply, invoke};

fn into_properties(reply: Reply, method: &str) -> Result<PropertyMap> {
    match reply {
        Reply::Properties(props) => Ok(props),
        _ => Err(ConnmanError::UnexpectedReply(method.to_string())),
    }
}

fn into_objects(reply: Reply, method: &str) -> Result<Vec<(String, PropertyMap)>> {
    match reply {
        Reply::Objects(objects) => Ok(objects),
        _ => Err(ConnmanError::UnexpectedReply(method.to_string())),
    }
}

/// Lists services in daemon order, optionally only those of type `filter`.
///
/// Zero services is an empty list, not an error.
pub(crate) async fn list_services(
    manager: &dyn RemoteObject,
    filter: Option<TechnologyType>,
    timeout: Duration,
) -> Result<Vec<Service>> {
    let call = Call::GetServices;
    let method = call.method_name();
    let objects = into_objects(invoke(manager, call, timeout).await?, method)?;

    let services: Vec<Service> = objects
        .into_iter()
        .map(|(path, props)| Service::new(path, props))
        .filter(|s| filter.is_none_or(|t| s.raw_type() == Some(t.as_str())))
        .collect();

    debug!(
        "Found {} services{}",
        services.len(),
        filter.map(|t| format!(" of type {t}")).unwrap_or_default()
    );
    Ok(services)
}

/// Lists technologies as reported by `GetTechnologies`.
pub(crate) async fn list_technologies(
    manager: &dyn RemoteObject,
    timeout: Duration,
) -> Result<Vec<TechnologyInfo>> {
    let call = Call::GetTechnologies;
    let method = call.method_name();
    let objects = into_objects(invoke(manager, call, timeout).await?, method)?;
    Ok(objects
        .into_iter()
        .map(|(path, properties)| TechnologyInfo { path, properties })
        .collect())
}

pub(crate) async fn get_properties(
    object: &dyn RemoteObject,
    timeout: Duration,
) -> Result<PropertyMap> {
    let call = Call::GetProperties;
    let method = call.method_name();
    into_properties(invoke(object, call, timeout).await?, method)
}

/// Sets one property. Failures are wrapped in `PropertySet` naming `name`.
pub(crate) async fn set_property(
    object: &dyn RemoteObject,
    name: &str,
    value: PropertyValue,
    timeout: Duration,
) -> Result<()> {
    debug!("{}: {name} = {value}", object.path());
    invoke(object, Call::SetProperty(name.to_string(), value), timeout)
        .await
        .map(|_| ())
        .map_err(|e| ConnmanError::PropertySet {
            property: name.to_string(),
            source: Box::new(e),
        })
}
