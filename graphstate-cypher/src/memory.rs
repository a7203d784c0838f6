use graphstate_core::memory::memory_type_of;
use graphstate_core::{
    Codec, GraphExecutor, MemoryItem, MemoryOp, Namespace, Params, Record, StoreError, Value,
    DEFAULT_MEMORY_TYPE, NAMESPACE_SEPARATOR,
};
use tracing::Instrument;

use crate::bootstrap::ensure_schema;
use crate::clock::next_timestamp;
use crate::identity::require;
use crate::row;
use crate::schema::{
    DELETE_MEMORY_CYPHER, GET_MEMORY_CYPHER, LIST_MEMORY_KEYS_CYPHER, LIST_NAMESPACES_CYPHER,
    LIST_NAMESPACES_PREFIX_CYPHER, MEMORY_SCHEMA_CYPHER, SEARCH_MEMORY_BY_TYPE_CYPHER,
    SEARCH_MEMORY_CYPHER, UPSERT_MEMORY_CYPHER,
};

/// Long-lived memory records keyed by `(namespace, key)`.
pub struct MemoryStore<E> {
    executor: E,
    codec: Codec,
}

impl<E: GraphExecutor> MemoryStore<E> {
    /// Builds the store and bootstraps its constraint and index.
    pub async fn new(executor: E, codec: Codec) -> Self {
        let report = ensure_schema(&executor, &MEMORY_SCHEMA_CYPHER).await;
        tracing::debug!(?report, "memory schema bootstrap finished");
        Self { executor, codec }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Upserts `value` under `key`. The first write's `created_at` survives
    /// every later put; the type tag follows the value's own category.
    pub async fn put(
        &self,
        namespace: &Namespace,
        key: &str,
        value: &Value,
    ) -> Result<(), StoreError> {
        const OPERATION: &str = "memory.put";
        require("key", key)?;

        let encoded = self
            .codec
            .encode(value)
            .map_err(|error| StoreError::encode(OPERATION, "value", error))?;
        let params = Params::new()
            .with("namespace", namespace.joined())
            .with("key", key)
            .with("value", encoded)
            .with("type", memory_type_of(value))
            .with("now", next_timestamp());

        self.executor
            .execute_write(UPSERT_MEMORY_CYPHER, params)
            .instrument(tracing::debug_span!("memory_put", namespace = %namespace, key = %key))
            .await
            .map_err(|error| StoreError::from_backend(OPERATION, identity(namespace, key), error))?;
        Ok(())
    }

    /// The decoded value, or `None` when the key was never written.
    pub async fn get(
        &self,
        namespace: &Namespace,
        key: &str,
    ) -> Result<Option<Value>, StoreError> {
        Ok(self.get_item(namespace, key).await?.map(|item| item.value))
    }

    /// The full record including its type tag and timestamps.
    pub async fn get_item(
        &self,
        namespace: &Namespace,
        key: &str,
    ) -> Result<Option<MemoryItem>, StoreError> {
        const OPERATION: &str = "memory.get";
        require("key", key)?;

        let params = Params::new()
            .with("namespace", namespace.joined())
            .with("key", key);
        let records = self
            .executor
            .execute_read(GET_MEMORY_CYPHER, params)
            .instrument(tracing::debug_span!("memory_get", namespace = %namespace, key = %key))
            .await
            .map_err(|error| StoreError::from_backend(OPERATION, identity(namespace, key), error))?;

        Ok(records
            .into_iter()
            .next()
            .map(|record| self.decode_item(namespace, record)))
    }

    /// Removes the record and returns how many were removed; zero for an
    /// absent key.
    pub async fn delete(&self, namespace: &Namespace, key: &str) -> Result<u64, StoreError> {
        const OPERATION: &str = "memory.delete";
        require("key", key)?;

        let params = Params::new()
            .with("namespace", namespace.joined())
            .with("key", key);
        let outcome = self
            .executor
            .execute_write(DELETE_MEMORY_CYPHER, params)
            .instrument(tracing::debug_span!("memory_delete", namespace = %namespace, key = %key))
            .await
            .map_err(|error| StoreError::from_backend(OPERATION, identity(namespace, key), error))?;

        Ok(outcome
            .records
            .iter()
            .map(|record| row::count(record, "removed"))
            .sum())
    }

    /// Keys in `namespace`, most recently updated first.
    pub async fn list(&self, namespace: &Namespace) -> Result<Vec<String>, StoreError> {
        const OPERATION: &str = "memory.list";

        let params = Params::new().with("namespace", namespace.joined());
        let records = self
            .executor
            .execute_read(LIST_MEMORY_KEYS_CYPHER, params)
            .instrument(tracing::debug_span!("memory_list", namespace = %namespace))
            .await
            .map_err(|error| {
                StoreError::from_backend(OPERATION, format!("namespace={namespace}"), error)
            })?;

        Ok(records
            .iter()
            .filter_map(|record| row::owned_text(record, "key"))
            .collect())
    }

    /// Case-insensitive substring scan over the stored value text.
    ///
    /// Matches are ordered most recently updated first and capped at `limit`.
    /// With `type_filter`, only records carrying exactly that type tag match.
    pub async fn search(
        &self,
        namespace: &Namespace,
        query: &str,
        limit: usize,
        type_filter: Option<&str>,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        const OPERATION: &str = "memory.search";
        if limit == 0 {
            return Ok(Vec::new());
        }

        let params = Params::new()
            .with("namespace", namespace.joined())
            .with("query", query)
            .with("limit", i64::try_from(limit).unwrap_or(i64::MAX));
        let (statement, params) = match type_filter {
            Some(kind) => (SEARCH_MEMORY_BY_TYPE_CYPHER, params.with("type", kind)),
            None => (SEARCH_MEMORY_CYPHER, params),
        };

        let records = self
            .executor
            .execute_read(statement, params)
            .instrument(tracing::debug_span!(
                "memory_search",
                namespace = %namespace,
                limit = limit,
                type_filter = ?type_filter
            ))
            .await
            .map_err(|error| {
                StoreError::from_backend(OPERATION, format!("namespace={namespace}"), error)
            })?;

        Ok(records
            .into_iter()
            .filter_map(|record| {
                let item = self.decode_item(namespace, record);
                (!item.key.is_empty()).then_some((item.key, item.value))
            })
            .collect())
    }

    /// Distinct namespaces holding at least one record, optionally limited to
    /// `prefix` and everything below it.
    pub async fn list_namespaces(
        &self,
        prefix: Option<&Namespace>,
    ) -> Result<Vec<Namespace>, StoreError> {
        const OPERATION: &str = "memory.list_namespaces";

        let (statement, params, identity) = match prefix {
            Some(prefix) => (
                LIST_NAMESPACES_PREFIX_CYPHER,
                Params::new()
                    .with("prefix", prefix.joined())
                    .with("prefix_path", format!("{}{NAMESPACE_SEPARATOR}", prefix.joined())),
                format!("prefix={prefix}"),
            ),
            None => (LIST_NAMESPACES_CYPHER, Params::new(), "all namespaces".to_string()),
        };

        let records = self
            .executor
            .execute_read(statement, params)
            .instrument(tracing::debug_span!("memory_list_namespaces", %identity))
            .await
            .map_err(|error| StoreError::from_backend(OPERATION, identity, error))?;

        Ok(records
            .iter()
            .filter_map(|record| row::text(record, "namespace"))
            .filter_map(|joined| match Namespace::parse(joined) {
                Ok(namespace) => Some(namespace),
                Err(error) => {
                    tracing::warn!(namespace = %joined, error = %error, "stored namespace skipped");
                    None
                }
            })
            .collect())
    }

    /// Batches are not executed piecemeal; callers issue single operations.
    pub async fn batch(&self, ops: Vec<MemoryOp>) -> Result<Vec<Option<Value>>, StoreError> {
        tracing::debug!(operations = ops.len(), "rejecting memory batch");
        Err(StoreError::Unsupported("memory batch operations"))
    }

    fn decode_item(&self, namespace: &Namespace, record: Record) -> MemoryItem {
        let key = row::owned_text(&record, "key").unwrap_or_default();
        let value = match row::text(&record, "value") {
            Some(text) => self.codec.decode(text),
            None => {
                tracing::warn!(namespace = %namespace, key = %key, "memory row without value");
                Value::Null
            }
        };

        MemoryItem {
            namespace: namespace.clone(),
            key,
            value,
            kind: row::owned_text(&record, "type")
                .unwrap_or_else(|| DEFAULT_MEMORY_TYPE.to_string()),
            created_at: row::owned_text(&record, "created_at"),
            updated_at: row::owned_text(&record, "updated_at"),
        }
    }
}

fn identity(namespace: &Namespace, key: &str) -> String {
    format!("namespace={namespace} key={key}")
}
