//! Value model, codec and record types shared by the graphstate stores.
//!
//! The stores persist arbitrary application [`Value`]s as text. Registered
//! [`Structured`] types are written inside typed envelopes and reconstructed
//! through an explicit [`TypeRegistry`]; retired field values are normalized
//! on read by a [`MigrationTable`](migration::MigrationTable).

pub mod checkpoint;
pub mod codec;
mod error;
pub mod executor;
pub mod memory;
pub mod migration;
pub mod namespace;
mod registry;
mod value;

pub use checkpoint::{
    new_checkpoint_id, ChannelVersions, CheckpointAddress, CheckpointMetadata, CheckpointSource,
    CheckpointTuple, PendingWrite,
};
pub use codec::Codec;
pub use error::{
    BackendError, CodecError, ConfigError, ConnectionError, ExecutionError, MigrationError,
    StoreError,
};
pub use executor::{GraphExecutor, Params, Record, WriteOutcome};
pub use memory::{MemoryItem, MemoryOp, DEFAULT_MEMORY_TYPE};
pub use namespace::{Namespace, NAMESPACE_SEPARATOR};
pub use registry::TypeRegistry;
pub use value::{format_datetime, DynStructured, JsonValue, Structured, Value};
