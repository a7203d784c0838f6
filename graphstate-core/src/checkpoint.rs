use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::{JsonValue, Structured, Value};

/// Identity of one stored checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointAddress {
    pub thread_id: String,
    pub checkpoint_id: String,
}

impl CheckpointAddress {
    pub fn new(thread_id: impl Into<String>, checkpoint_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            checkpoint_id: checkpoint_id.into(),
        }
    }
}

impl std::fmt::Display for CheckpointAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "thread_id={} checkpoint_id={}",
            self.thread_id, self.checkpoint_id
        )
    }
}

/// A fresh checkpoint identifier.
pub fn new_checkpoint_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointSource {
    Input,
    #[default]
    Loop,
    Update,
    Fork,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    #[serde(default)]
    pub source: CheckpointSource,
    #[serde(default)]
    pub step: i64,
    /// Writes that produced this checkpoint, keyed by node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writes: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parents: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, JsonValue>,
}

impl CheckpointMetadata {
    pub fn new(source: CheckpointSource, step: i64) -> Self {
        Self {
            source,
            step,
            ..Self::default()
        }
    }

    pub fn with_writes(mut self, writes: JsonValue) -> Self {
        self.writes = Some(writes);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

impl Structured for CheckpointMetadata {
    const TYPE_ID: &'static str = "graphstate.checkpoint.Metadata";
}

/// Channel name to version counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelVersions {
    pub versions: BTreeMap<String, u64>,
}

impl ChannelVersions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, channel: impl Into<String>, version: u64) -> Self {
        self.versions.insert(channel.into(), version);
        self
    }

    pub fn get(&self, channel: &str) -> Option<u64> {
        self.versions.get(channel).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

impl Structured for ChannelVersions {
    const TYPE_ID: &'static str = "graphstate.checkpoint.ChannelVersions";
}

/// A decoded checkpoint as returned by `get` and `list`.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointTuple {
    pub address: CheckpointAddress,
    pub state: Value,
    pub metadata: CheckpointMetadata,
    pub new_versions: ChannelVersions,
    /// First write time, canonical ISO-8601.
    pub timestamp: Option<String>,
}

/// Intermediate output of one task within a step.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub task_id: String,
    pub channel: String,
    pub value: Value,
}
