use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Serialize};

pub type JsonValue = serde_json::Value;

/// A registered application type that round-trips through the codec.
///
/// `TYPE_ID` is the stable discriminator written into stored envelopes. It
/// must never change once records have been written with it.
pub trait Structured:
    Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    const TYPE_ID: &'static str;

    /// Self-declared category, used as the memory record type tag.
    fn category(&self) -> Option<String> {
        None
    }
}

/// Object-safe view of a [`Structured`] value.
pub trait DynStructured: fmt::Debug + Send + Sync {
    fn type_identifier(&self) -> &'static str;
    fn fields(&self) -> Result<JsonValue, serde_json::Error>;
    fn declared_category(&self) -> Option<String>;
    fn as_any(&self) -> &dyn Any;
    fn clone_boxed(&self) -> Box<dyn DynStructured>;
    fn dyn_eq(&self, other: &dyn DynStructured) -> bool;
}

impl<T: Structured> DynStructured for T {
    fn type_identifier(&self) -> &'static str {
        T::TYPE_ID
    }

    fn fields(&self) -> Result<JsonValue, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn declared_category(&self) -> Option<String> {
        Structured::category(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_boxed(&self) -> Box<dyn DynStructured> {
        Box::new(self.clone())
    }

    fn dyn_eq(&self, other: &dyn DynStructured) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

impl Clone for Box<dyn DynStructured> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

/// Application value persisted by the stores.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Instance of a registered type; reconstructed exactly on decode.
    Structured(Box<dyn DynStructured>),
    /// Value with attributes but no registered type. Decodes back as a `Map`.
    Object {
        type_name: String,
        attributes: BTreeMap<String, Value>,
    },
}

impl Value {
    pub fn structured<T: Structured>(value: T) -> Self {
        Value::Structured(Box::new(value))
    }

    pub fn object(type_name: impl Into<String>, attributes: BTreeMap<String, Value>) -> Self {
        Value::Object {
            type_name: type_name.into(),
            attributes,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            Value::Object { attributes, .. } => Some(attributes),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }

    pub fn downcast_ref<T: Structured>(&self) -> Option<&T> {
        match self {
            Value::Structured(inner) => inner.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Returns a `T` for a matching structured value, or for a raw map whose
    /// fields deserialize into `T` (a record whose type was unresolvable).
    pub fn to_structured<T: Structured>(&self) -> Option<T> {
        match self {
            Value::Structured(inner) => inner.as_any().downcast_ref::<T>().cloned(),
            Value::Map(_) | Value::Object { .. } => {
                serde_json::from_value(self.to_plain_json()).ok()
            }
            _ => None,
        }
    }

    /// Self-declared category: a structured type's own category, or the
    /// `type` entry of a map.
    pub fn category(&self) -> Option<String> {
        match self {
            Value::Structured(inner) => inner.declared_category(),
            Value::Map(_) | Value::Object { .. } => self
                .get("type")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    }

    /// JSON view without envelopes. Non-finite floats become `null`.
    pub fn to_plain_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(value) => JsonValue::Bool(*value),
            Value::Int(value) => JsonValue::from(*value),
            Value::Float(value) => serde_json::Number::from_f64(*value)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::String(value) => JsonValue::String(value.clone()),
            Value::DateTime(value) => JsonValue::String(format_datetime(value)),
            Value::List(items) => {
                JsonValue::Array(items.iter().map(Value::to_plain_json).collect())
            }
            Value::Map(map) | Value::Object { attributes: map, .. } => JsonValue::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_plain_json()))
                    .collect(),
            ),
            Value::Structured(inner) => inner.fields().unwrap_or(JsonValue::Null),
        }
    }
}

/// Canonical ISO-8601 form used for every timestamp the crate writes.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(left), Value::Bool(right)) => left == right,
            (Value::Int(left), Value::Int(right)) => left == right,
            (Value::Float(left), Value::Float(right)) => left == right,
            (Value::String(left), Value::String(right)) => left == right,
            (Value::DateTime(left), Value::DateTime(right)) => left == right,
            (Value::List(left), Value::List(right)) => left == right,
            (Value::Map(left), Value::Map(right)) => left == right,
            (Value::Structured(left), Value::Structured(right)) => left.dyn_eq(right.as_ref()),
            (
                Value::Object {
                    type_name: left_name,
                    attributes: left,
                },
                Value::Object {
                    type_name: right_name,
                    attributes: right,
                },
            ) => left_name == right_name && left == right,
            _ => false,
        }
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(value) => Value::Bool(value),
            JsonValue::Number(number) => match number.as_i64() {
                Some(value) => Value::Int(value),
                None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(value) => Value::String(value),
            JsonValue::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Value::Map(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Map(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}
