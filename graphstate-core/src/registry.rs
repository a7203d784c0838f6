use std::collections::HashMap;
use std::fmt;

use crate::checkpoint::{ChannelVersions, CheckpointMetadata};
use crate::value::{DynStructured, JsonValue, Structured};

type Constructor =
    Box<dyn Fn(JsonValue) -> Result<Box<dyn DynStructured>, serde_json::Error> + Send + Sync>;

/// Explicit mapping from stored type identifiers to constructors.
///
/// Decoding only ever reconstructs types present here; anything else comes
/// back as a plain map.
pub struct TypeRegistry {
    constructors: HashMap<String, Constructor>,
}

impl TypeRegistry {
    /// Registry pre-populated with the checkpoint metadata types.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register::<CheckpointMetadata>();
        registry.register::<ChannelVersions>();
        registry
    }

    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    pub fn register<T: Structured>(&mut self) -> &mut Self {
        self.register_with(T::TYPE_ID, |fields| {
            let value: T = serde_json::from_value(fields)?;
            Ok(Box::new(value) as Box<dyn DynStructured>)
        })
    }

    pub fn register_with<F>(&mut self, type_id: &str, constructor: F) -> &mut Self
    where
        F: Fn(JsonValue) -> Result<Box<dyn DynStructured>, serde_json::Error>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(type_id.to_string(), Box::new(constructor));
        self
    }

    pub fn with<T: Structured>(mut self) -> Self {
        self.register::<T>();
        self
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.constructors.contains_key(type_id)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// `None` when the identifier is unknown.
    pub fn construct(
        &self,
        type_id: &str,
        fields: JsonValue,
    ) -> Option<Result<Box<dyn DynStructured>, serde_json::Error>> {
        self.constructors
            .get(type_id)
            .map(|constructor| constructor(fields))
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut type_ids: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        type_ids.sort_unstable();
        f.debug_struct("TypeRegistry")
            .field("type_ids", &type_ids)
            .finish()
    }
}
