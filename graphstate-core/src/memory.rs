use crate::namespace::Namespace;
use crate::value::Value;

/// Type tag used when a value declares no category of its own.
pub const DEFAULT_MEMORY_TYPE: &str = "general";

/// One stored memory record.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryItem {
    pub namespace: Namespace,
    pub key: String,
    pub value: Value,
    /// Category tag derived from the value when it was written.
    pub kind: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Type tag recorded for `value`.
pub fn memory_type_of(value: &Value) -> String {
    value
        .category()
        .filter(|category| !category.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MEMORY_TYPE.to_string())
}

/// Operations a batch call would carry. Batches are rejected by the stores.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryOp {
    Put {
        namespace: Namespace,
        key: String,
        value: Value,
    },
    Get {
        namespace: Namespace,
        key: String,
    },
    Delete {
        namespace: Namespace,
        key: String,
    },
    Search {
        namespace: Namespace,
        query: String,
        limit: usize,
        type_filter: Option<String>,
    },
}
