use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::BackendError;
use crate::value::JsonValue;

/// One flat result row, column name to value.
pub type Record = BTreeMap<String, JsonValue>;

/// Named statement parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: BTreeMap<String, JsonValue>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(JsonValue::as_str)
    }

    pub fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Rows returned by a write statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOutcome {
    pub records: Vec<Record>,
}

/// Execution surface of a graph backend.
#[async_trait::async_trait]
pub trait GraphExecutor: Send + Sync {
    async fn execute_read(&self, query: &str, params: Params) -> Result<Vec<Record>, BackendError>;

    /// Runs `query` inside a write transaction that commits on success.
    async fn execute_write(&self, query: &str, params: Params)
        -> Result<WriteOutcome, BackendError>;
}

#[async_trait::async_trait]
impl<E: GraphExecutor + ?Sized> GraphExecutor for Arc<E> {
    async fn execute_read(&self, query: &str, params: Params) -> Result<Vec<Record>, BackendError> {
        (**self).execute_read(query, params).await
    }

    async fn execute_write(
        &self,
        query: &str,
        params: Params,
    ) -> Result<WriteOutcome, BackendError> {
        (**self).execute_write(query, params).await
    }
}
