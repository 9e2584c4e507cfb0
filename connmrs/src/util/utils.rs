//! Helpers for timeouts and D-Bus value conversion.

use futures::future::{self, Either};
use futures_timer::Delay;
use log::warn;
use std::collections::HashMap;
use std::future::Future;
use std::pin::pin;
use std::time::Duration;
use zvariant::Value;

use crate::Result;
use crate::api::models::{ConnmanError, PropertyMap, PropertyValue};

/// Runs `fut` with a deadline.
///
/// On expiry the future is dropped, so any late completion is ignored, and
/// `ConnmanError::Timeout` naming `method` is returned. Uses `futures-timer`
/// so it works on any executor.
pub(crate) async fn with_timeout<F, T>(fut: F, timeout: Duration, method: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match future::select(pin!(fut), pin!(Delay::new(timeout))).await {
        Either::Left((result, _)) => result,
        Either::Right(((), _)) => {
            warn!("{method} timed out after {timeout:?}");
            Err(ConnmanError::Timeout {
                method: method.to_string(),
                timeout,
            })
        }
    }
}

/// Converts a received D-Bus value into a [`PropertyValue`].
///
/// Variants are unwrapped, object paths and signatures become strings,
/// structures become lists. Dictionary keys are stringified.
pub(crate) fn from_dbus_value(value: &Value<'_>) -> Result<PropertyValue> {
    let converted = match value {
        Value::Bool(b) => PropertyValue::Bool(*b),
        Value::U8(v) => PropertyValue::Byte(*v),
        Value::I16(v) => PropertyValue::Int(i64::from(*v)),
        Value::I32(v) => PropertyValue::Int(i64::from(*v)),
        Value::I64(v) => PropertyValue::Int(*v),
        Value::U16(v) => PropertyValue::UInt(u64::from(*v)),
        Value::U32(v) => PropertyValue::UInt(u64::from(*v)),
        Value::U64(v) => PropertyValue::UInt(*v),
        Value::F64(v) => PropertyValue::Double(*v),
        Value::Str(s) => PropertyValue::Str(s.to_string()),
        Value::Signature(s) => PropertyValue::Str(s.to_string()),
        Value::ObjectPath(p) => PropertyValue::Str(p.to_string()),
        Value::Value(inner) => from_dbus_value(inner)?,
        Value::Array(array) => PropertyValue::List(
            array
                .iter()
                .map(from_dbus_value)
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Dict(dict) => {
            let mut map = PropertyMap::new();
            for (key, entry) in dict.iter() {
                let key = match from_dbus_value(key)? {
                    PropertyValue::Str(s) => s,
                    other => other.to_string(),
                };
                map.insert(key, from_dbus_value(entry)?);
            }
            PropertyValue::Dict(map)
        }
        Value::Structure(fields) => PropertyValue::List(
            fields
                .fields()
                .iter()
                .map(from_dbus_value)
                .collect::<Result<Vec<_>>>()?,
        ),
        other => {
            return Err(ConnmanError::InvalidArgument(format!(
                "unsupported D-Bus value with signature '{}'",
                other.value_signature()
            )));
        }
    };
    Ok(converted)
}

/// Converts a property map received over D-Bus.
pub(crate) fn from_dbus_map<'a, I, V>(entries: I) -> Result<PropertyMap>
where
    I: IntoIterator<Item = (String, V)>,
    V: std::ops::Deref<Target = Value<'a>>,
{
    entries
        .into_iter()
        .map(|(k, v)| Ok((k, from_dbus_value(&*v)?)))
        .collect()
}

/// Converts a [`PropertyValue`] into a D-Bus value for `SetProperty`.
///
/// String lists are sent as `as`, other lists as `av`, dictionaries as `a{sv}`.
/// Integers use the narrowest of 32/64 bits that fits.
pub(crate) fn to_dbus_value(value: &PropertyValue) -> Value<'static> {
    match value {
        PropertyValue::Bool(b) => Value::Bool(*b),
        PropertyValue::Byte(v) => Value::U8(*v),
        PropertyValue::Int(v) => i32::try_from(*v).map_or(Value::I64(*v), Value::I32),
        PropertyValue::UInt(v) => u32::try_from(*v).map_or(Value::U64(*v), Value::U32),
        PropertyValue::Double(v) => Value::F64(*v),
        PropertyValue::Str(s) => Value::from(s.clone()),
        PropertyValue::List(items) => {
            let strings: Option<Vec<String>> = items
                .iter()
                .map(|i| i.as_str().map(str::to_string))
                .collect();
            match strings {
                Some(strings) => Value::from(strings),
                None => Value::from(items.iter().map(to_dbus_value).collect::<Vec<_>>()),
            }
        }
        PropertyValue::Dict(map) => {
            let entries: HashMap<String, Value<'static>> = map
                .iter()
                .map(|(k, v)| (k.clone(), to_dbus_value(v)))
                .collect();
            Value::from(entries)
        }
    }
}

/// Logs a warning and returns `None` from the enclosing function on error.
#[macro_export]
#[doc(hidden)]
macro_rules! try_log {
    ($result:expr, $context:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => {
                log::warn!("{}: {:?}", $context, e);
                return None;
            }
        }
    };
}
