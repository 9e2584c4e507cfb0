//! Property queries over service collections.
//!
//! A [`Query`] is a conjunction: every key must match. A key bound to
//! [`QueryValue::AnyOf`] matches when the property equals any of the listed
//! values.

use std::collections::HashMap;

use crate::api::models::{PropertyMap, PropertyValue, Service};

/// Expected value(s) for one property.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// The property must equal this value.
    One(PropertyValue),
    /// The property must equal one of these values.
    AnyOf(Vec<PropertyValue>),
}

impl QueryValue {
    fn matches(&self, actual: &PropertyValue) -> bool {
        match self {
            Self::One(expected) => expected == actual,
            Self::AnyOf(accepted) => accepted.iter().any(|v| v == actual),
        }
    }
}

/// A filter over service properties.
///
/// # Example
///
/// ```rust
/// use connmrs::Query;
///
/// let query = Query::new()
///     .eq("Type", "wifi")
///     .any_of("State", ["ready", "online"]);
/// assert_eq!(query.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    terms: HashMap<String, QueryValue>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `name` to equal `value`.
    #[must_use]
    pub fn eq(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.terms
            .insert(name.into(), QueryValue::One(value.into()));
        self
    }

    /// Requires `name` to equal one of `values`.
    #[must_use]
    pub fn any_of<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<PropertyValue>,
    {
        self.terms.insert(
            name.into(),
            QueryValue::AnyOf(values.into_iter().map(Into::into).collect()),
        );
        self
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Returns true if every term matches. Absent properties never match.
    pub fn matches(&self, properties: &PropertyMap) -> bool {
        self.terms.iter().all(|(name, expected)| {
            properties
                .get(name)
                .is_some_and(|actual| expected.matches(actual))
        })
    }

    /// Returns the first service in `services` that matches.
    pub fn first_match<'a, I>(&self, services: I) -> Option<&'a Service>
    where
        I: IntoIterator<Item = &'a Service>,
    {
        services.into_iter().find(|s| self.matches(&s.properties))
    }
}

impl FromIterator<(String, QueryValue)> for Query {
    fn from_iter<T: IntoIterator<Item = (String, QueryValue)>>(iter: T) -> Self {
        Self {
            terms: iter.into_iter().collect(),
        }
    }
}
