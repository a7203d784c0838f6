pub const CHECKPOINT_LABEL: &str = "Checkpoint";
pub const MEMORY_LABEL: &str = "Memory";

pub const CREATE_CHECKPOINT_CONSTRAINT_CYPHER: &str = "CREATE CONSTRAINT checkpoint_identity \
IF NOT EXISTS FOR (c:Checkpoint) REQUIRE (c.thread_id, c.checkpoint_id) IS UNIQUE";

pub const CREATE_CHECKPOINT_INDEX_CYPHER: &str = "CREATE INDEX checkpoint_thread_timestamp \
IF NOT EXISTS FOR (c:Checkpoint) ON (c.thread_id, c.timestamp)";

pub const CREATE_MEMORY_CONSTRAINT_CYPHER: &str = "CREATE CONSTRAINT memory_identity IF NOT EXISTS \
FOR (m:Memory) REQUIRE (m.namespace, m.key) IS UNIQUE";

pub const CREATE_MEMORY_INDEX_CYPHER: &str = "CREATE INDEX memory_namespace_updated IF NOT EXISTS \
FOR (m:Memory) ON (m.namespace, m.updated_at)";

pub const CHECKPOINT_SCHEMA_CYPHER: [&str; 2] = [
    CREATE_CHECKPOINT_CONSTRAINT_CYPHER,
    CREATE_CHECKPOINT_INDEX_CYPHER,
];

pub const MEMORY_SCHEMA_CYPHER: [&str; 2] =
    [CREATE_MEMORY_CONSTRAINT_CYPHER, CREATE_MEMORY_INDEX_CYPHER];

// Checkpoints. `timestamp` is written once; `updated_at` on every put.

pub const UPSERT_CHECKPOINT_CYPHER: &str = "MERGE (c:Checkpoint \
{thread_id: $thread_id, checkpoint_id: $checkpoint_id}) \
SET c.checkpoint_data = $checkpoint_data, \
c.metadata = $metadata, \
c.new_versions = $new_versions, \
c.timestamp = coalesce(c.timestamp, $now), \
c.updated_at = $now \
RETURN c.thread_id AS thread_id, c.checkpoint_id AS checkpoint_id";

pub const GET_CHECKPOINT_CYPHER: &str = "MATCH (c:Checkpoint \
{thread_id: $thread_id, checkpoint_id: $checkpoint_id}) \
RETURN c.checkpoint_id AS checkpoint_id, c.checkpoint_data AS checkpoint_data, \
c.metadata AS metadata, c.new_versions AS new_versions, c.timestamp AS timestamp";

pub const GET_LATEST_CHECKPOINT_CYPHER: &str = "MATCH (c:Checkpoint {thread_id: $thread_id}) \
RETURN c.checkpoint_id AS checkpoint_id, c.checkpoint_data AS checkpoint_data, \
c.metadata AS metadata, c.new_versions AS new_versions, c.timestamp AS timestamp \
ORDER BY c.timestamp DESC, c.checkpoint_id DESC \
LIMIT 1";

pub const LIST_CHECKPOINTS_CYPHER: &str = "MATCH (c:Checkpoint {thread_id: $thread_id}) \
RETURN c.checkpoint_id AS checkpoint_id, c.checkpoint_data AS checkpoint_data, \
c.metadata AS metadata, c.new_versions AS new_versions, c.timestamp AS timestamp \
ORDER BY c.timestamp DESC, c.checkpoint_id DESC";

pub const LIST_CHECKPOINTS_LIMIT_CYPHER: &str = "MATCH (c:Checkpoint {thread_id: $thread_id}) \
RETURN c.checkpoint_id AS checkpoint_id, c.checkpoint_data AS checkpoint_data, \
c.metadata AS metadata, c.new_versions AS new_versions, c.timestamp AS timestamp \
ORDER BY c.timestamp DESC, c.checkpoint_id DESC \
LIMIT $limit";

// Memory records. `created_at` is written once; `updated_at` on every put.

pub const UPSERT_MEMORY_CYPHER: &str = "MERGE (m:Memory {namespace: $namespace, key: $key}) \
ON CREATE SET m.created_at = $now \
SET m.value = $value, m.type = $type, m.updated_at = $now";

pub const GET_MEMORY_CYPHER: &str = "MATCH (m:Memory {namespace: $namespace, key: $key}) \
RETURN m.key AS key, m.value AS value, m.type AS type, \
m.created_at AS created_at, m.updated_at AS updated_at";

pub const DELETE_MEMORY_CYPHER: &str = "MATCH (m:Memory {namespace: $namespace, key: $key}) \
DELETE m \
RETURN count(m) AS removed";

pub const LIST_MEMORY_KEYS_CYPHER: &str = "MATCH (m:Memory {namespace: $namespace}) \
RETURN m.key AS key \
ORDER BY m.updated_at DESC, m.key ASC";

pub const SEARCH_MEMORY_CYPHER: &str = "MATCH (m:Memory {namespace: $namespace}) \
WHERE toLower(m.value) CONTAINS toLower($query) \
RETURN m.key AS key, m.value AS value, m.type AS type, \
m.created_at AS created_at, m.updated_at AS updated_at \
ORDER BY m.updated_at DESC, m.key ASC \
LIMIT $limit";

pub const SEARCH_MEMORY_BY_TYPE_CYPHER: &str = "MATCH (m:Memory {namespace: $namespace}) \
WHERE m.type = $type AND toLower(m.value) CONTAINS toLower($query) \
RETURN m.key AS key, m.value AS value, m.type AS type, \
m.created_at AS created_at, m.updated_at AS updated_at \
ORDER BY m.updated_at DESC, m.key ASC \
LIMIT $limit";

pub const LIST_NAMESPACES_CYPHER: &str = "MATCH (m:Memory) \
RETURN DISTINCT m.namespace AS namespace \
ORDER BY namespace";

pub const LIST_NAMESPACES_PREFIX_CYPHER: &str = "MATCH (m:Memory) \
WHERE m.namespace = $prefix OR m.namespace STARTS WITH $prefix_path \
RETURN DISTINCT m.namespace AS namespace \
ORDER BY namespace";
