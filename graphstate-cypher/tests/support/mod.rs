#![allow(dead_code)]

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;

use graphstate_core::migration::{FieldMigration, MigrationTable};
use graphstate_core::{
    BackendError, Codec, ExecutionError, GraphExecutor, JsonValue, Params, Record, Structured,
    TypeRegistry, WriteOutcome,
};
use graphstate_cypher::schema::*;
use serde::{Deserialize, Serialize};

pub type Node = BTreeMap<String, JsonValue>;

#[derive(Default)]
struct State {
    checkpoints: BTreeMap<(String, String), Node>,
    memories: BTreeMap<(String, String), Node>,
    schema: Vec<String>,
    executed: Vec<String>,
    fail_next: VecDeque<BackendError>,
    fail_always: HashMap<String, BackendError>,
}

/// In-memory graph that runs the statements this crate issues.
///
/// Each statement executes under one lock, which gives MERGE the same
/// atomicity the database provides.
#[derive(Default)]
pub struct FakeGraph {
    state: Mutex<State>,
}

impl FakeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next statement, whatever it is, fails with `error`.
    pub fn fail_next(&self, error: BackendError) {
        self.lock().fail_next.push_back(error);
    }

    /// Every run of `statement` fails with `error`.
    pub fn fail_always(&self, statement: &str, error: BackendError) {
        self.lock().fail_always.insert(statement.to_string(), error);
    }

    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    pub fn executed_count(&self, statement: &str) -> usize {
        self.lock()
            .executed
            .iter()
            .filter(|executed| executed.as_str() == statement)
            .count()
    }

    pub fn schema(&self) -> Vec<String> {
        self.lock().schema.clone()
    }

    pub fn checkpoint_node(&self, thread_id: &str, checkpoint_id: &str) -> Option<Node> {
        self.lock()
            .checkpoints
            .get(&(thread_id.to_string(), checkpoint_id.to_string()))
            .cloned()
    }

    pub fn checkpoint_count(&self) -> usize {
        self.lock().checkpoints.len()
    }

    pub fn memory_node(&self, namespace: &str, key: &str) -> Option<Node> {
        self.lock()
            .memories
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
    }

    pub fn memory_count(&self) -> usize {
        self.lock().memories.len()
    }

    /// Stores a memory node as-is, bypassing the codec. Identity properties
    /// already present in `node` win over the arguments.
    pub fn insert_memory_node(&self, namespace: &str, key: &str, node: Node) {
        let mut node = node;
        node.entry("namespace".to_string())
            .or_insert_with(|| JsonValue::from(namespace));
        node.entry("key".to_string())
            .or_insert_with(|| JsonValue::from(key));
        self.lock()
            .memories
            .insert((namespace.to_string(), key.to_string()), node);
    }

    /// Stores a checkpoint node as-is, bypassing the codec. Identity
    /// properties already present in `node` win over the arguments.
    pub fn insert_checkpoint_node(&self, thread_id: &str, checkpoint_id: &str, node: Node) {
        let mut node = node;
        node.entry("thread_id".to_string())
            .or_insert_with(|| JsonValue::from(thread_id));
        node.entry("checkpoint_id".to_string())
            .or_insert_with(|| JsonValue::from(checkpoint_id));
        self.lock()
            .checkpoints
            .insert((thread_id.to_string(), checkpoint_id.to_string()), node);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn run(&self, query: &str, params: &Params) -> Result<Vec<Record>, BackendError> {
        let mut state = self.lock();
        state.executed.push(query.to_string());

        if let Some(error) = state.fail_next.pop_front() {
            return Err(error);
        }
        if let Some(error) = state.fail_always.get(query) {
            return Err(error.clone());
        }

        let text = |key: &str| -> Result<String, BackendError> {
            params
                .get_str(key)
                .map(str::to_string)
                .ok_or_else(|| execution_error(query, params, &format!("missing ${key}")))
        };
        let limit = |fallback: usize| -> usize {
            params
                .get("limit")
                .and_then(JsonValue::as_u64)
                .map(|limit| limit as usize)
                .unwrap_or(fallback)
        };

        match query {
            q if is_schema(q) => {
                state.schema.push(q.to_string());
                Ok(Vec::new())
            }
            UPSERT_CHECKPOINT_CYPHER => {
                let identity = (text("thread_id")?, text("checkpoint_id")?);
                let now = text("now")?;
                let node = state.checkpoints.entry(identity.clone()).or_default();
                node.insert("thread_id".into(), identity.0.clone().into());
                node.insert("checkpoint_id".into(), identity.1.clone().into());
                for field in ["checkpoint_data", "metadata", "new_versions"] {
                    node.insert(field.into(), params.get(field).cloned().unwrap_or_default());
                }
                node.entry("timestamp".to_string())
                    .or_insert_with(|| now.clone().into());
                node.insert("updated_at".into(), now.into());
                Ok(vec![project(node, &["thread_id", "checkpoint_id"])])
            }
            GET_CHECKPOINT_CYPHER => {
                let identity = (text("thread_id")?, text("checkpoint_id")?);
                Ok(state
                    .checkpoints
                    .get(&identity)
                    .map(|node| project(node, &CHECKPOINT_COLUMNS))
                    .into_iter()
                    .collect())
            }
            GET_LATEST_CHECKPOINT_CYPHER
            | LIST_CHECKPOINTS_CYPHER
            | LIST_CHECKPOINTS_LIMIT_CYPHER => {
                let thread_id = text("thread_id")?;
                let mut nodes: Vec<&Node> = state
                    .checkpoints
                    .values()
                    .filter(|node| str_of(node, "thread_id") == thread_id)
                    .collect();
                nodes.sort_by_key(|node| {
                    Reverse((str_of(node, "timestamp"), str_of(node, "checkpoint_id")))
                });
                let cap = match query {
                    GET_LATEST_CHECKPOINT_CYPHER => 1,
                    LIST_CHECKPOINTS_LIMIT_CYPHER => limit(usize::MAX),
                    _ => usize::MAX,
                };
                Ok(nodes
                    .into_iter()
                    .take(cap)
                    .map(|node| project(node, &CHECKPOINT_COLUMNS))
                    .collect())
            }
            UPSERT_MEMORY_CYPHER => {
                let identity = (text("namespace")?, text("key")?);
                let now = text("now")?;
                let node = state.memories.entry(identity.clone()).or_default();
                if node.is_empty() {
                    node.insert("created_at".into(), now.clone().into());
                }
                node.insert("namespace".into(), identity.0.into());
                node.insert("key".into(), identity.1.into());
                node.insert("value".into(), params.get("value").cloned().unwrap_or_default());
                node.insert("type".into(), params.get("type").cloned().unwrap_or_default());
                node.insert("updated_at".into(), now.into());
                Ok(Vec::new())
            }
            GET_MEMORY_CYPHER => {
                let identity = (text("namespace")?, text("key")?);
                Ok(state
                    .memories
                    .get(&identity)
                    .map(|node| project(node, &MEMORY_COLUMNS))
                    .into_iter()
                    .collect())
            }
            DELETE_MEMORY_CYPHER => {
                let identity = (text("namespace")?, text("key")?);
                let removed = u64::from(state.memories.remove(&identity).is_some());
                Ok(vec![[("removed".to_string(), JsonValue::from(removed))]
                    .into_iter()
                    .collect()])
            }
            LIST_MEMORY_KEYS_CYPHER => {
                let namespace = text("namespace")?;
                Ok(recent_first(&state.memories, &namespace)
                    .into_iter()
                    .map(|node| project(node, &["key"]))
                    .collect())
            }
            SEARCH_MEMORY_CYPHER | SEARCH_MEMORY_BY_TYPE_CYPHER => {
                let namespace = text("namespace")?;
                let needle = text("query")?.to_lowercase();
                let kind = match query {
                    SEARCH_MEMORY_BY_TYPE_CYPHER => Some(text("type")?),
                    _ => None,
                };
                Ok(recent_first(&state.memories, &namespace)
                    .into_iter()
                    .filter(|node| {
                        kind.as_deref()
                            .map_or(true, |kind| str_of(node, "type") == kind)
                    })
                    .filter(|node| str_of(node, "value").to_lowercase().contains(&needle))
                    .take(limit(usize::MAX))
                    .map(|node| project(node, &MEMORY_COLUMNS))
                    .collect())
            }
            LIST_NAMESPACES_CYPHER | LIST_NAMESPACES_PREFIX_CYPHER => {
                let prefix = params.get_str("prefix").map(str::to_string);
                let prefix_path = params.get_str("prefix_path").map(str::to_string);
                let namespaces: BTreeSet<String> = state
                    .memories
                    .keys()
                    .map(|(namespace, _)| namespace.clone())
                    .filter(|namespace| match (&prefix, &prefix_path) {
                        (Some(prefix), Some(path)) => {
                            namespace == prefix || namespace.starts_with(path.as_str())
                        }
                        _ => true,
                    })
                    .collect();
                Ok(namespaces
                    .into_iter()
                    .map(|namespace| {
                        [("namespace".to_string(), JsonValue::from(namespace))]
                            .into_iter()
                            .collect()
                    })
                    .collect())
            }
            other => Err(execution_error(other, params, "unknown statement")),
        }
    }
}

#[async_trait::async_trait]
impl GraphExecutor for FakeGraph {
    async fn execute_read(&self, query: &str, params: Params) -> Result<Vec<Record>, BackendError> {
        tokio::task::yield_now().await;
        self.run(query, &params)
    }

    async fn execute_write(
        &self,
        query: &str,
        params: Params,
    ) -> Result<WriteOutcome, BackendError> {
        tokio::task::yield_now().await;
        self.run(query, &params)
            .map(|records| WriteOutcome { records })
    }
}

const CHECKPOINT_COLUMNS: [&str; 5] = [
    "checkpoint_id",
    "checkpoint_data",
    "metadata",
    "new_versions",
    "timestamp",
];

const MEMORY_COLUMNS: [&str; 5] = ["key", "value", "type", "created_at", "updated_at"];

fn is_schema(query: &str) -> bool {
    CHECKPOINT_SCHEMA_CYPHER.contains(&query) || MEMORY_SCHEMA_CYPHER.contains(&query)
}

fn project(node: &Node, columns: &[&str]) -> Record {
    columns
        .iter()
        .map(|column| {
            (
                column.to_string(),
                node.get(*column).cloned().unwrap_or(JsonValue::Null),
            )
        })
        .collect()
}

fn str_of<'a>(node: &'a Node, property: &str) -> &'a str {
    node.get(property).and_then(JsonValue::as_str).unwrap_or("")
}

fn recent_first<'a>(
    memories: &'a BTreeMap<(String, String), Node>,
    namespace: &str,
) -> Vec<&'a Node> {
    let mut nodes: Vec<&Node> = memories
        .iter()
        .filter(|((stored, _), _)| stored == namespace)
        .map(|(_, node)| node)
        .collect();
    nodes.sort_by(|left, right| {
        str_of(right, "updated_at")
            .cmp(str_of(left, "updated_at"))
            .then_with(|| str_of(left, "key").cmp(str_of(right, "key")))
    });
    nodes
}

fn execution_error(query: &str, params: &Params, reason: &str) -> BackendError {
    BackendError::Execution(ExecutionError::new(query, params.keys(), reason))
}

pub fn syntax_error(statement: &str) -> BackendError {
    BackendError::Execution(ExecutionError::new(
        statement,
        Vec::new(),
        "Neo.ClientError.Statement.SyntaxError",
    ))
}

pub fn already_exists(statement: &str) -> BackendError {
    BackendError::Execution(ExecutionError::new(
        statement,
        Vec::new(),
        "Neo.ClientError.Schema.EquivalentSchemaRuleAlreadyExists: \
         an equivalent constraint already exists",
    ))
}

// Tutor domain used across the store tests.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub content: String,
    pub category: String,
}

impl Exercise {
    pub fn new(content: &str, category: &str) -> Self {
        Self {
            content: content.to_string(),
            category: category.to_string(),
        }
    }
}

impl Structured for Exercise {
    const TYPE_ID: &'static str = "tutor.Exercise";

    fn category(&self) -> Option<String> {
        Some(self.category.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub category: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonState {
    pub topic: String,
    pub history: Vec<Turn>,
}

impl Structured for LessonState {
    const TYPE_ID: &'static str = "tutor.LessonState";
}

pub fn codec() -> Codec {
    let registry = TypeRegistry::new()
        .with::<Exercise>()
        .with::<LessonState>();
    let migrations = MigrationTable::builder()
        .rule(
            "tutor.LessonState",
            FieldMigration::at("history[].category")
                .retire("concept", "explanation")
                .retire("theory", "explanation"),
        )
        .rule(
            "tutor.Exercise",
            FieldMigration::at("category").retire("drill", "practice"),
        )
        .build()
        .expect("test migrations are valid");
    Codec::new(registry, migrations)
}
