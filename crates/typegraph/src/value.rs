//! Runtime values flowing through resolvers.
//!
//! [`Data`] is the value a resolver returns and the value arguments are
//! converted into. Object values are [`Instance`]s that remember the
//! definition they were created from, which is what union and interface
//! resolution use to pick a concrete member type.

use std::sync::atomic::{AtomicU64, Ordering};

use async_graphql::{Name, Value};
use indexmap::IndexMap;

/// Identity of a declared definition.
///
/// Every type, enum and specialization gets a fresh origin; instances carry
/// the origin of the definition that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Origin(u64);

impl Origin {
    pub(crate) fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Data {
    /// The value was not supplied. Distinct from [`Data::Null`].
    #[default]
    Unset,
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
    Enum(EnumMember),
    List(Vec<Data>),
    Object(Instance),
    /// Opaque payload of a custom scalar.
    Json(serde_json::Value),
}

impl Data {
    #[must_use]
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// True for both `Null` and `Unset`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Unset)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Data]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Self::Object(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumMember> {
        match self {
            Self::Enum(member) => Some(member),
            _ => None,
        }
    }

    /// Reads an attribute of an object value.
    pub fn attribute(&self, name: &str) -> Option<&Data> {
        self.as_instance().and_then(|instance| instance.get(name))
    }

    /// Structural conversion from a GraphQL value. Enum literals become
    /// strings; objects are kept as opaque JSON.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Boolean(b) => Self::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::String(s.clone()),
            Value::Enum(name) => Self::String(name.to_string()),
            Value::List(items) => Self::List(items.iter().map(Self::from_value).collect()),
            other => other
                .clone()
                .into_json()
                .map_or(Self::Null, Self::Json),
        }
    }

    /// Converts to a GraphQL value. `Unset` has no representation.
    pub fn to_value(&self) -> Option<Value> {
        Some(match self {
            Self::Unset => return None,
            Self::Null => Value::Null,
            Self::Boolean(b) => Value::Boolean(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::String(s) => Value::String(s.clone()),
            Self::Enum(member) => Value::Enum(Name::new(member.name())),
            Self::List(items) => Value::List(items.iter().filter_map(Data::to_value).collect()),
            Self::Object(instance) => Value::Object(
                instance
                    .fields()
                    .filter_map(|(k, v)| Some((Name::new(k), v.to_value()?)))
                    .collect(),
            ),
            Self::Json(json) => Value::from_json(json.clone()).ok()?,
        })
    }
}

impl From<bool> for Data {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Data {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Data {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Data {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Data {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Data {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Instance> for Data {
    fn from(value: Instance) -> Self {
        Self::Object(value)
    }
}

impl From<EnumMember> for Data {
    fn from(value: EnumMember) -> Self {
        Self::Enum(value)
    }
}

impl<T: Into<Data>> From<Vec<T>> for Data {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Data>> From<Option<T>> for Data {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A member of a declared enum.
///
/// The wire representation is the member's name; `value` is the internal
/// payload that never crosses the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    enum_name: String,
    name: String,
    value: Box<Data>,
}

impl EnumMember {
    pub(crate) fn new(enum_name: &str, name: &str, value: Data) -> Self {
        Self {
            enum_name: enum_name.to_owned(),
            name: name.to_owned(),
            value: Box::new(value),
        }
    }

    pub fn enum_name(&self) -> &str {
        &self.enum_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Data {
        &self.value
    }
}

/// An object value: the attributes of one instance of a declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    origin: Origin,
    typename: Option<String>,
    fields: IndexMap<String, Data>,
}

impl Instance {
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            typename: None,
            fields: IndexMap::new(),
        }
    }

    /// Sets an attribute, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Data>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Tags the instance with an explicit schema type name. The tag takes
    /// precedence over origin matching when resolving unions and interfaces.
    #[must_use]
    pub fn with_typename(mut self, name: impl Into<String>) -> Self {
        self.typename = Some(name.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Data>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Data> {
        self.fields.get(name)
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn typename(&self) -> Option<&str> {
        self.typename.as_deref()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Data)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_is_distinct_from_null() {
        assert_ne!(Data::Unset, Data::Null);
        assert!(Data::Unset.is_null());
        assert!(Data::Unset.is_unset());
        assert!(!Data::Null.is_unset());
        assert_eq!(Data::Unset.to_value(), None);
        assert_eq!(Data::Null.to_value(), Some(Value::Null));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Data::from(Some(3)), Data::Int(3));
        assert_eq!(Data::from(None::<i64>), Data::Null);
        assert_eq!(
            Data::from(vec!["a", "b"]),
            Data::List(vec![Data::from("a"), Data::from("b")])
        );
        assert_eq!(Data::Int(2).as_f64(), Some(2.0));
        assert_eq!(Data::from_value(&Value::from(3)), Data::Int(3));
        assert_eq!(Data::from_value(&Value::from(1.5)), Data::Float(1.5));
    }

    #[test]
    fn test_instance_to_value_skips_unset() {
        let instance = Instance::new(Origin::fresh())
            .with("a", 1)
            .with("b", Data::Unset)
            .with("c", "x");
        let value = Data::from(instance).to_value().unwrap();
        let Value::Object(map) = value else {
            panic!("expected object");
        };
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a"), Some(&Value::from(1)));
    }

    #[test]
    fn test_origins_are_unique() {
        assert_ne!(Origin::fresh(), Origin::fresh());
    }
}
