//! Text encoding of [`Value`]s with typed envelopes.
//!
//! Plain data is stored as ordinary JSON. Structured values and attribute
//! objects are wrapped in an envelope discriminated by [`ENVELOPE_KEY`]:
//!
//! ```text
//! {"__kind__":"structured","type_id":"tutor.Exercise","data":{...}}
//! {"__kind__":"object","type_name":"Unregistered","attributes":{...}}
//! ```
//!
//! Decoding is best-effort and never fails. Malformed text comes back as a
//! string, unknown type identifiers come back as plain maps.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::migration::MigrationTable;
use crate::registry::TypeRegistry;
use crate::value::{format_datetime, JsonValue, Structured, Value};

pub const ENVELOPE_KEY: &str = "__kind__";

/// Deepest nesting of arrays and objects that [`Codec::decode`] can read
/// back; serde_json refuses anything deeper.
pub const MAX_NESTING_DEPTH: usize = 127;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "__kind__", rename_all = "snake_case")]
enum Envelope {
    Structured {
        type_id: String,
        data: JsonValue,
    },
    Object {
        type_name: String,
        attributes: serde_json::Map<String, JsonValue>,
    },
}

#[derive(Debug, Clone)]
pub struct Codec {
    registry: Arc<TypeRegistry>,
    migrations: Arc<MigrationTable>,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(TypeRegistry::new(), MigrationTable::new())
    }
}

impl Codec {
    pub fn new(registry: TypeRegistry, migrations: MigrationTable) -> Self {
        Self {
            registry: Arc::new(registry),
            migrations: Arc::new(migrations),
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn migrations(&self) -> &MigrationTable {
        &self.migrations
    }

    pub fn encode(&self, value: &Value) -> Result<String, CodecError> {
        let json = self.encode_json(value)?;
        Ok(serde_json::to_string(&json)?)
    }

    pub fn encode_json(&self, value: &Value) -> Result<JsonValue, CodecError> {
        self.encode_nested(value, 0)
    }

    /// `depth` counts the arrays and objects enclosing `value`.
    fn encode_nested(&self, value: &Value, depth: usize) -> Result<JsonValue, CodecError> {
        match value {
            Value::Null => Ok(JsonValue::Null),
            Value::Bool(value) => Ok(JsonValue::Bool(*value)),
            Value::Int(value) => Ok(JsonValue::from(*value)),
            Value::Float(value) => serde_json::Number::from_f64(*value)
                .map(JsonValue::Number)
                .ok_or(CodecError::NonFiniteFloat(*value)),
            Value::String(value) => Ok(JsonValue::String(value.clone())),
            Value::DateTime(value) => Ok(JsonValue::String(format_datetime(value))),
            Value::List(items) => {
                let depth = enter(depth)?;
                items
                    .iter()
                    .map(|item| self.encode_nested(item, depth))
                    .collect::<Result<Vec<_>, _>>()
                    .map(JsonValue::Array)
            }
            Value::Map(map) => self.encode_map(map, enter(depth)?).map(JsonValue::Object),
            Value::Structured(inner) => {
                let type_id = inner.type_identifier();
                if !self.registry.contains(type_id) {
                    return Err(CodecError::UnregisteredType(type_id.to_string()));
                }
                let data = inner.fields()?;
                if !data.is_object() {
                    return Err(CodecError::FieldsNotObject {
                        type_id: type_id.to_string(),
                        actual: json_kind(&data),
                    });
                }
                if enter(depth)? + json_depth(&data) > MAX_NESTING_DEPTH {
                    return Err(CodecError::TooDeep {
                        limit: MAX_NESTING_DEPTH,
                    });
                }
                Ok(serde_json::to_value(Envelope::Structured {
                    type_id: type_id.to_string(),
                    data,
                })?)
            }
            Value::Object {
                type_name,
                attributes,
            } => {
                // envelope, then its attributes object
                let depth = enter(enter(depth)?)?;
                Ok(serde_json::to_value(Envelope::Object {
                    type_name: type_name.clone(),
                    attributes: self.encode_map(attributes, depth)?,
                })?)
            }
        }
    }

    fn encode_map(
        &self,
        map: &BTreeMap<String, Value>,
        depth: usize,
    ) -> Result<serde_json::Map<String, JsonValue>, CodecError> {
        let mut out = serde_json::Map::new();
        for (key, value) in map {
            if key == ENVELOPE_KEY {
                return Err(CodecError::ReservedKey(key.clone()));
            }
            out.insert(key.clone(), self.encode_nested(value, depth)?);
        }
        Ok(out)
    }

    pub fn encode_structured<T: Structured>(&self, value: &T) -> Result<String, CodecError> {
        self.encode(&Value::structured(value.clone()))
    }

    pub fn decode(&self, text: &str) -> Value {
        match serde_json::from_str::<JsonValue>(text) {
            Ok(json) => self.decode_json(json),
            Err(error) => {
                tracing::error!(
                    error = %error,
                    length = text.len(),
                    "stored payload is not valid JSON; returning raw text"
                );
                Value::String(text.to_string())
            }
        }
    }

    pub fn decode_json(&self, json: JsonValue) -> Value {
        match json {
            JsonValue::Array(items) => {
                Value::List(items.into_iter().map(|item| self.decode_json(item)).collect())
            }
            JsonValue::Object(map) if map.contains_key(ENVELOPE_KEY) => self.decode_envelope(map),
            JsonValue::Object(map) => self.decode_map(map),
            other => Value::from(other),
        }
    }

    /// Decodes `text` and returns it as `T` when it holds (or can be read as) one.
    pub fn decode_as<T: Structured>(&self, text: &str) -> Option<T> {
        self.decode(text).to_structured::<T>()
    }

    fn decode_map(&self, map: serde_json::Map<String, JsonValue>) -> Value {
        Value::Map(
            map.into_iter()
                .map(|(key, value)| (key, self.decode_json(value)))
                .collect(),
        )
    }

    fn decode_envelope(&self, map: serde_json::Map<String, JsonValue>) -> Value {
        let envelope = match serde_json::from_value::<Envelope>(JsonValue::Object(map.clone())) {
            Ok(envelope) => envelope,
            Err(error) => {
                tracing::warn!(error = %error, "malformed envelope; decoding as a plain map");
                return self.decode_map(map);
            }
        };

        match envelope {
            Envelope::Structured { type_id, data } => {
                let migrated = self.migrations.migrate(&type_id, data);
                match self.registry.construct(&type_id, migrated.data.clone()) {
                    Some(Ok(value)) => Value::Structured(value),
                    Some(Err(error)) => {
                        tracing::warn!(
                            type_id = %type_id,
                            error = %error,
                            "stored fields do not match registered type; returning raw fields"
                        );
                        self.decode_json(migrated.data)
                    }
                    None => {
                        tracing::warn!(
                            type_id = %type_id,
                            "type identifier is not registered; returning raw fields"
                        );
                        self.decode_json(migrated.data)
                    }
                }
            }
            Envelope::Object { attributes, .. } => self.decode_map(attributes),
        }
    }
}

fn enter(depth: usize) -> Result<usize, CodecError> {
    let depth = depth + 1;
    if depth > MAX_NESTING_DEPTH {
        return Err(CodecError::TooDeep {
            limit: MAX_NESTING_DEPTH,
        });
    }
    Ok(depth)
}

/// Number of arrays and objects on the deepest path through `value`.
fn json_depth(value: &JsonValue) -> usize {
    let mut deepest = 0;
    let mut pending = vec![(value, 0)];
    while let Some((value, enclosing)) = pending.pop() {
        match value {
            JsonValue::Array(items) => {
                deepest = deepest.max(enclosing + 1);
                pending.extend(items.iter().map(|item| (item, enclosing + 1)));
            }
            JsonValue::Object(map) => {
                deepest = deepest.max(enclosing + 1);
                pending.extend(map.values().map(|item| (item, enclosing + 1)));
            }
            _ => {}
        }
    }
    deepest
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
