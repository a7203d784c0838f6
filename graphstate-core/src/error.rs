use std::time::Duration;

use thiserror::Error;

/// Missing or unusable connection parameters. Raised when configuration is
/// built, never lazily.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0} is required")]
    Missing(&'static str),
    #[error("invalid configuration: {0} cannot be empty")]
    Empty(&'static str),
    #[error("invalid configuration: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("graph backend at '{uri}' is unreachable: {reason}")]
    Unreachable { uri: String, reason: String },
    #[error("graph backend at '{uri}' rejected credentials for '{principal}': {reason}")]
    AuthenticationRejected {
        uri: String,
        principal: String,
        reason: String,
    },
}

/// A statement failed against a live connection. Only parameter keys are kept;
/// values may carry payloads or secrets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "statement failed: {reason} (statement: `{statement}`, parameters: [{}])",
    .parameter_keys.join(", ")
)]
pub struct ExecutionError {
    pub statement: String,
    pub parameter_keys: Vec<String>,
    pub reason: String,
}

impl ExecutionError {
    pub fn new(
        statement: impl Into<String>,
        parameter_keys: Vec<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            statement: statement.into(),
            parameter_keys,
            reason: reason.into(),
        }
    }

    /// True when the backend reported that a schema object is already present.
    pub fn is_already_exists(&self) -> bool {
        let reason = self.reason.to_ascii_lowercase();
        reason.contains("already exists") || reason.contains("equivalentschemarule")
    }
}

/// Failure reported by a [`GraphExecutor`](crate::executor::GraphExecutor).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error("statement `{statement}` timed out after {after:?}")]
    Timeout { statement: String, after: Duration },
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("structured type '{0}' is not registered")]
    UnregisteredType(String),
    #[error("map key '{0}' is reserved for envelopes")]
    ReservedKey(String),
    #[error("structured type '{type_id}' must serialize to an object, got {actual}")]
    FieldsNotObject {
        type_id: String,
        actual: &'static str,
    },
    #[error("float {0} cannot be encoded")]
    NonFiniteFloat(f64),
    #[error("value nests deeper than {limit} arrays and objects and could not be read back")]
    TooDeep { limit: usize },
    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    #[error("migration path for '{type_id}' is empty")]
    EmptyPath { type_id: String },
    #[error("migration path '{path}' has an empty segment")]
    EmptySegment { path: String },
    #[error(
        "migration for '{type_id}' at '{path}' rewrites to '{label}', which is itself retired"
    )]
    ChainedRewrite {
        type_id: String,
        path: String,
        label: String,
    },
}

/// Error surfaced by store operations.
///
/// Configuration and connection failures pass through unchanged; statement
/// failures and timeouts carry the operation and identity involved.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("{operation} failed for {identity}: {source}")]
    Execution {
        operation: &'static str,
        identity: String,
        #[source]
        source: ExecutionError,
    },
    #[error("{operation} timed out after {after:?} for {identity}")]
    Timeout {
        operation: &'static str,
        identity: String,
        after: Duration,
    },
    #[error("failed to encode {field} for {operation}: {source}")]
    Encode {
        operation: &'static str,
        field: &'static str,
        #[source]
        source: CodecError,
    },
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),
    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),
    #[error("{0} is not supported")]
    Unsupported(&'static str),
}

impl StoreError {
    pub fn from_backend(
        operation: &'static str,
        identity: impl Into<String>,
        error: BackendError,
    ) -> Self {
        match error {
            BackendError::Config(error) => StoreError::Config(error),
            BackendError::Connection(error) => StoreError::Connection(error),
            BackendError::Execution(source) => StoreError::Execution {
                operation,
                identity: identity.into(),
                source,
            },
            BackendError::Timeout { after, .. } => StoreError::Timeout {
                operation,
                identity: identity.into(),
                after,
            },
        }
    }

    pub fn encode(operation: &'static str, field: &'static str, source: CodecError) -> Self {
        StoreError::Encode {
            operation,
            field,
            source,
        }
    }
}
