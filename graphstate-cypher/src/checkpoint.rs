use std::collections::HashMap;

use graphstate_core::{
    ChannelVersions, CheckpointAddress, CheckpointMetadata, CheckpointTuple, Codec,
    GraphExecutor, Params, PendingWrite, Record, StoreError, Structured, Value,
};
use tokio::sync::RwLock;
use tracing::Instrument;

use crate::bootstrap::ensure_schema;
use crate::clock::next_timestamp;
use crate::identity::require;
use crate::row;
use crate::schema::{
    CHECKPOINT_SCHEMA_CYPHER, GET_CHECKPOINT_CYPHER, GET_LATEST_CHECKPOINT_CYPHER,
    LIST_CHECKPOINTS_CYPHER, LIST_CHECKPOINTS_LIMIT_CYPHER, UPSERT_CHECKPOINT_CYPHER,
};

/// Writes proposed during the step that follows `checkpoint_id`.
#[derive(Debug, Default)]
struct PendingSlot {
    checkpoint_id: String,
    writes: Vec<PendingWrite>,
}

/// Durable workflow checkpoints keyed by `(thread_id, checkpoint_id)`.
///
/// State, metadata and channel versions are encoded independently through
/// the [`Codec`] and written with one atomic upsert. Concurrent puts to the
/// same address are last-write-wins at the backend.
pub struct CheckpointStore<E> {
    executor: E,
    codec: Codec,
    pending: RwLock<HashMap<String, PendingSlot>>,
}

impl<E: GraphExecutor> CheckpointStore<E> {
    /// Builds the store and bootstraps its constraint and index.
    pub async fn new(executor: E, codec: Codec) -> Self {
        let report = ensure_schema(&executor, &CHECKPOINT_SCHEMA_CYPHER).await;
        tracing::debug!(?report, "checkpoint schema bootstrap finished");
        Self {
            executor,
            codec,
            pending: RwLock::new(HashMap::new()),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Upserts one checkpoint and hands back its address unchanged.
    ///
    /// `timestamp` is set on the first write only; `updated_at` on every write.
    pub async fn put(
        &self,
        address: CheckpointAddress,
        state: &Value,
        metadata: &CheckpointMetadata,
        versions: &ChannelVersions,
    ) -> Result<CheckpointAddress, StoreError> {
        const OPERATION: &str = "checkpoint.put";
        validate(&address)?;

        let state = self
            .codec
            .encode(state)
            .map_err(|error| StoreError::encode(OPERATION, "state", error))?;
        let metadata = self
            .codec
            .encode_structured(metadata)
            .map_err(|error| StoreError::encode(OPERATION, "metadata", error))?;
        let versions = self
            .codec
            .encode_structured(versions)
            .map_err(|error| StoreError::encode(OPERATION, "new_versions", error))?;

        let params = Params::new()
            .with("thread_id", address.thread_id.as_str())
            .with("checkpoint_id", address.checkpoint_id.as_str())
            .with("checkpoint_data", state)
            .with("metadata", metadata)
            .with("new_versions", versions)
            .with("now", next_timestamp());

        self.executor
            .execute_write(UPSERT_CHECKPOINT_CYPHER, params)
            .instrument(tracing::debug_span!("checkpoint_put", %address))
            .await
            .map_err(|error| StoreError::from_backend(OPERATION, address.to_string(), error))?;

        self.retire_pending(&address).await;
        Ok(address)
    }

    /// Exact checkpoint when `checkpoint_id` is given, otherwise the newest
    /// one for the thread. `None` when nothing matches.
    pub async fn get(
        &self,
        thread_id: &str,
        checkpoint_id: Option<&str>,
    ) -> Result<Option<CheckpointTuple>, StoreError> {
        const OPERATION: &str = "checkpoint.get";
        require("thread_id", thread_id)?;

        let (statement, params, identity) = match checkpoint_id {
            Some(checkpoint_id) => {
                require("checkpoint_id", checkpoint_id)?;
                (
                    GET_CHECKPOINT_CYPHER,
                    Params::new()
                        .with("thread_id", thread_id)
                        .with("checkpoint_id", checkpoint_id),
                    CheckpointAddress::new(thread_id, checkpoint_id).to_string(),
                )
            }
            None => (
                GET_LATEST_CHECKPOINT_CYPHER,
                Params::new().with("thread_id", thread_id),
                format!("thread_id={thread_id}"),
            ),
        };

        let records = self
            .executor
            .execute_read(statement, params)
            .instrument(tracing::debug_span!("checkpoint_get", %identity))
            .await
            .map_err(|error| StoreError::from_backend(OPERATION, identity, error))?;

        Ok(records
            .into_iter()
            .find_map(|record| decode_row(&self.codec, thread_id, record)))
    }

    /// Checkpoints for `thread_id`, newest first, capped at `limit`.
    ///
    /// Rows are fetched in one round trip; payloads are decoded only as the
    /// returned iterator is advanced.
    pub async fn list(
        &self,
        thread_id: &str,
        limit: Option<usize>,
    ) -> Result<CheckpointList, StoreError> {
        const OPERATION: &str = "checkpoint.list";
        require("thread_id", thread_id)?;

        if limit == Some(0) {
            return Ok(CheckpointList::new(self.codec.clone(), thread_id, Vec::new()));
        }

        let params = Params::new().with("thread_id", thread_id);
        let (statement, params) = match limit {
            Some(limit) => (
                LIST_CHECKPOINTS_LIMIT_CYPHER,
                params.with("limit", i64::try_from(limit).unwrap_or(i64::MAX)),
            ),
            None => (LIST_CHECKPOINTS_CYPHER, params),
        };

        let records = self
            .executor
            .execute_read(statement, params)
            .instrument(tracing::debug_span!("checkpoint_list", thread_id = %thread_id, ?limit))
            .await
            .map_err(|error| {
                StoreError::from_backend(OPERATION, format!("thread_id={thread_id}"), error)
            })?;

        Ok(CheckpointList::new(self.codec.clone(), thread_id, records))
    }

    /// Records intermediate writes made by `task_id` on top of `address`.
    ///
    /// Held in this process only and discarded as soon as a different
    /// checkpoint is put for the same thread. A thread abandoned mid-step
    /// keeps its writes until [`CheckpointStore::clear_pending`] is called.
    pub async fn put_writes(
        &self,
        address: &CheckpointAddress,
        task_id: &str,
        writes: Vec<(String, Value)>,
    ) -> Result<(), StoreError> {
        const OPERATION: &str = "checkpoint.put_writes";
        validate(address)?;
        require("task_id", task_id)?;

        for (_, value) in &writes {
            self.codec
                .encode_json(value)
                .map_err(|error| StoreError::encode(OPERATION, "writes", error))?;
        }

        let mut pending = self.pending.write().await;
        let slot = pending.entry(address.thread_id.clone()).or_default();
        if slot.checkpoint_id != address.checkpoint_id {
            slot.checkpoint_id = address.checkpoint_id.clone();
            slot.writes.clear();
        }
        slot.writes.retain(|write| write.task_id != task_id);
        slot.writes
            .extend(writes.into_iter().map(|(channel, value)| PendingWrite {
                task_id: task_id.to_string(),
                channel,
                value,
            }));
        Ok(())
    }

    /// Writes recorded for `address` that have not been superseded.
    pub async fn pending_writes(&self, address: &CheckpointAddress) -> Vec<PendingWrite> {
        let pending = self.pending.read().await;
        pending
            .get(&address.thread_id)
            .filter(|slot| slot.checkpoint_id == address.checkpoint_id)
            .map(|slot| slot.writes.clone())
            .unwrap_or_default()
    }

    /// Drops every pending write held for `thread_id` and returns how many
    /// were discarded.
    pub async fn clear_pending(&self, thread_id: &str) -> usize {
        let removed = self.pending.write().await.remove(thread_id);
        let discarded = removed.map_or(0, |slot| slot.writes.len());
        if discarded > 0 {
            tracing::debug!(thread_id, discarded, "pending writes cleared");
        }
        discarded
    }

    async fn retire_pending(&self, address: &CheckpointAddress) {
        let mut pending = self.pending.write().await;
        let stale = pending
            .get(&address.thread_id)
            .is_some_and(|slot| slot.checkpoint_id != address.checkpoint_id);
        if stale {
            pending.remove(&address.thread_id);
        }
    }
}

fn validate(address: &CheckpointAddress) -> Result<(), StoreError> {
    require("thread_id", &address.thread_id)?;
    require("checkpoint_id", &address.checkpoint_id)
}

/// Lazily decoded checkpoints returned by [`CheckpointStore::list`].
pub struct CheckpointList {
    codec: Codec,
    thread_id: String,
    rows: std::vec::IntoIter<Record>,
}

impl CheckpointList {
    fn new(codec: Codec, thread_id: &str, rows: Vec<Record>) -> Self {
        Self {
            codec,
            thread_id: thread_id.to_string(),
            rows: rows.into_iter(),
        }
    }

    /// Rows not yet decoded.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl Iterator for CheckpointList {
    type Item = CheckpointTuple;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = self.rows.next()?;
            if let Some(tuple) = decode_row(&self.codec, &self.thread_id, record) {
                return Some(tuple);
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.rows.len()))
    }
}

impl std::fmt::Debug for CheckpointList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointList")
            .field("thread_id", &self.thread_id)
            .field("remaining", &self.rows.len())
            .finish()
    }
}

fn decode_row(codec: &Codec, thread_id: &str, record: Record) -> Option<CheckpointTuple> {
    let Some(checkpoint_id) = row::owned_text(&record, "checkpoint_id") else {
        tracing::warn!(thread_id = %thread_id, "checkpoint row without checkpoint_id skipped");
        return None;
    };
    let address = CheckpointAddress::new(thread_id, checkpoint_id);

    let state = match row::text(&record, "checkpoint_data") {
        Some(text) => codec.decode(text),
        None => {
            tracing::warn!(%address, "checkpoint row without checkpoint_data");
            Value::Null
        }
    };
    let metadata = decode_typed::<CheckpointMetadata>(codec, &record, "metadata", &address);
    let new_versions = decode_typed::<ChannelVersions>(codec, &record, "new_versions", &address);

    Some(CheckpointTuple {
        state,
        metadata,
        new_versions,
        timestamp: row::owned_text(&record, "timestamp"),
        address,
    })
}

fn decode_typed<T: Structured + Default>(
    codec: &Codec,
    record: &Record,
    column: &str,
    address: &CheckpointAddress,
) -> T {
    let Some(text) = row::text(record, column) else {
        return T::default();
    };
    codec.decode_as::<T>(text).unwrap_or_else(|| {
        tracing::warn!(
            %address,
            column = %column,
            type_id = T::TYPE_ID,
            "stored value does not decode to the expected type; using default"
        );
        T::default()
    })
}
