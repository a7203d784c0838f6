//! Neo4j backend for the graphstate stores.
//!
//! ```no_run
//! use graphstate_core::{Codec, Namespace, Value};
//! use graphstate_cypher::MemoryStore;
//! use graphstate_neo4j::{Neo4jConfig, Neo4jConnection};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Neo4jConfig::builder()
//!     .uri("bolt://localhost:7687")
//!     .user("neo4j")
//!     .password_from_env("NEO4J_PASSWORD")
//!     .build()?;
//! let connection = Arc::new(Neo4jConnection::new(config));
//! let memories = MemoryStore::new(connection.clone(), Codec::default()).await;
//!
//! let namespace = Namespace::new(["user-42", "memories"])?;
//! memories
//!     .put(&namespace, "joins", &Value::from("SQL joins are important"))
//!     .await?;
//! connection.close().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod convert;
mod error;

pub use config::{
    Neo4jConfig, Neo4jConfigBuilder, DATABASE_ENV, DEFAULT_FETCH_SIZE, DEFAULT_MAX_CONNECTIONS,
    LEGACY_USER_ENV, PASSWORD_ENV, URI_ENV, USERNAME_ENV,
};
pub use connection::{AccessMode, Neo4jConnection, Session};
