//! Cypher-backed checkpoint and memory stores.
//!
//! Both stores are generic over [`GraphExecutor`](graphstate_core::GraphExecutor),
//! so the same statements run against a live driver or an in-memory stand-in.

pub mod bootstrap;
pub mod checkpoint;
mod clock;
mod identity;
pub mod memory;
mod row;
pub mod schema;

pub use bootstrap::{ensure_schema, SchemaReport};
pub use checkpoint::{CheckpointList, CheckpointStore};
pub use memory::MemoryStore;
