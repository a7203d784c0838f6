use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use graphstate_core::{
    BackendError, ConfigError, ExecutionError, GraphExecutor, Params, Record, WriteOutcome,
};
use neo4rs::{ConfigBuilder, Graph, Txn};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::Neo4jConfig;
use crate::convert::to_query;
use crate::error::{classify, to_backend, Failure, FailureContext};

const CONNECTIVITY_CHECK: &str = "RETURN 1 AS ok";

/// Whether a session commits its transaction when the work succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

/// Lazily connected driver for one Neo4j deployment.
///
/// The underlying [`Graph`] pools connections and is shared by every session;
/// sessions themselves are scoped to one call.
pub struct Neo4jConnection {
    config: Neo4jConfig,
    driver: Mutex<Option<Graph>>,
}

impl std::fmt::Debug for Neo4jConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jConnection")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Neo4jConnection {
    /// No I/O happens until the first operation.
    pub fn new(config: Neo4jConfig) -> Self {
        Self {
            config,
            driver: Mutex::new(None),
        }
    }

    /// Builds a connection from `NEO4J_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(Neo4jConfig::from_env()?))
    }

    pub fn config(&self) -> &Neo4jConfig {
        &self.config
    }

    /// Returns the shared driver, creating it on first use or after `close`.
    pub async fn connect(&self) -> Result<Graph, BackendError> {
        let mut driver = self.driver.lock().await;
        if let Some(graph) = driver.as_ref() {
            return Ok(graph.clone());
        }

        let mut builder = ConfigBuilder::default()
            .uri(self.config.uri())
            .user(self.config.user())
            .password(self.config.password())
            .max_connections(self.config.max_connections())
            .fetch_size(self.config.fetch_size());
        if let Some(database) = self.config.database() {
            builder = builder.db(database);
        }
        let driver_config = builder
            .build()
            .map_err(|error| self.failure(error, "<connect>", Vec::new()))?;

        let graph = Graph::connect(driver_config)
            .await
            .map_err(|error| self.failure(error, "<connect>", Vec::new()))?;

        tracing::info!(
            uri = %self.config.uri(),
            user = %self.config.user(),
            database = ?self.config.database(),
            max_connections = self.config.max_connections(),
            "neo4j driver created"
        );
        *driver = Some(graph.clone());
        Ok(graph)
    }

    /// One round trip that tells an unreachable server apart from rejected
    /// credentials.
    pub async fn verify_connectivity(&self) -> Result<(), BackendError> {
        let records = self.execute_read(CONNECTIVITY_CHECK, Params::new()).await?;
        tracing::debug!(rows = records.len(), "neo4j connectivity verified");
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.driver.lock().await.is_some()
    }

    /// Drops the shared driver. Safe to call repeatedly; the next operation
    /// reconnects.
    pub async fn close(&self) {
        if self.driver.lock().await.take().is_some() {
            tracing::info!(uri = %self.config.uri(), "neo4j driver closed");
        }
    }

    /// Runs `work` inside one transaction.
    ///
    /// A successful write commits; everything else rolls back, including a
    /// read, an error and an expired deadline. The configured
    /// `query_timeout` bounds the whole session: connecting, beginning the
    /// transaction, the work itself and the commit or rollback. If the
    /// deadline passes, or the caller drops the returned future, the
    /// transaction is dropped uncommitted.
    pub async fn with_session<T, F>(&self, mode: AccessMode, work: F) -> Result<T, BackendError>
    where
        T: Send,
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<T, BackendError>> + Send,
    {
        let deadline = self.config.query_timeout().map(Deadline::starting_now);

        let graph = within(deadline, "<connect>", self.connect()).await?;
        let begin = async {
            graph
                .start_txn()
                .await
                .map_err(|error| self.failure(error, "<begin>", Vec::new()))
        };
        let txn = within(deadline, "<begin>", begin).await?;
        let mut session = Session {
            txn,
            uri: self.config.uri().to_string(),
            principal: self.config.user().to_string(),
            current: None,
        };

        let outcome = match deadline {
            Some(deadline) => {
                let timed = tokio::time::timeout_at(deadline.at, work(&mut session)).await;
                match timed {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        let statement = session.current.clone().unwrap_or_default();
                        return Err(deadline.expired(statement));
                    }
                }
            }
            None => work(&mut session).await,
        };

        match (mode, outcome) {
            (AccessMode::Write, Ok(value)) => {
                let statement = session.current.clone().unwrap_or_default();
                let commit = async {
                    session
                        .txn
                        .commit()
                        .await
                        .map_err(|error| self.failure(error, &statement, Vec::new()))
                };
                within(deadline, &statement, commit).await?;
                Ok(value)
            }
            (AccessMode::Read, Ok(value)) => {
                session.rollback(deadline).await;
                Ok(value)
            }
            (_, Err(error)) => {
                session.rollback(deadline).await;
                Err(error)
            }
        }
    }

    fn failure(&self, error: neo4rs::Error, statement: &str, keys: Vec<String>) -> BackendError {
        to_backend(
            error,
            FailureContext {
                uri: self.config.uri(),
                principal: self.config.user(),
                statement,
                parameter_keys: keys,
            },
        )
    }
}

#[async_trait::async_trait]
impl GraphExecutor for Neo4jConnection {
    async fn execute_read(&self, query: &str, params: Params) -> Result<Vec<Record>, BackendError> {
        let query = query.to_string();
        self.with_session(AccessMode::Read, move |session| {
            Box::pin(async move { session.run(&query, &params).await })
        })
        .await
    }

    async fn execute_write(
        &self,
        query: &str,
        params: Params,
    ) -> Result<WriteOutcome, BackendError> {
        let query = query.to_string();
        self.with_session(AccessMode::Write, move |session| {
            Box::pin(async move {
                let records = session.run(&query, &params).await?;
                Ok(WriteOutcome { records })
            })
        })
        .await
    }
}

/// Point in time by which a whole session must finish.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    after: Duration,
}

impl Deadline {
    fn starting_now(after: Duration) -> Self {
        Self {
            at: Instant::now() + after,
            after,
        }
    }

    fn expired(self, statement: String) -> BackendError {
        tracing::warn!(
            statement = %statement,
            after = ?self.after,
            "neo4j session exceeded its deadline"
        );
        BackendError::Timeout {
            statement,
            after: self.after,
        }
    }
}

/// Awaits one session step, giving up at `deadline`.
async fn within<T, Fut>(
    deadline: Option<Deadline>,
    statement: &str,
    step: Fut,
) -> Result<T, BackendError>
where
    Fut: Future<Output = Result<T, BackendError>>,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline.at, step)
            .await
            .unwrap_or_else(|_| Err(deadline.expired(statement.to_string()))),
        None => step.await,
    }
}

/// A transaction scoped to one [`Neo4jConnection::with_session`] call.
pub struct Session {
    txn: Txn,
    uri: String,
    principal: String,
    current: Option<String>,
}

impl Session {
    /// Executes one statement and collects its rows.
    pub async fn run(
        &mut self,
        statement: &str,
        params: &Params,
    ) -> Result<Vec<Record>, BackendError> {
        tracing::debug!(
            statement = %statement,
            parameters = ?params.keys(),
            "running statement"
        );
        self.current = Some(statement.to_string());

        let mut stream = self
            .txn
            .execute(to_query(statement, params))
            .await
            .map_err(|error| self.failure(error, statement, params))?;

        let mut records = Vec::new();
        loop {
            let next = stream.next(self.txn.handle()).await;
            let row = match next {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(error) => return Err(self.failure(error, statement, params)),
            };
            let record = row.to::<Record>().map_err(|error| {
                BackendError::Execution(ExecutionError::new(
                    statement,
                    params.keys(),
                    format!("row could not be read: {error}"),
                ))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    async fn rollback(self, deadline: Option<Deadline>) {
        let rollback = self.txn.rollback();
        let outcome = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline.at, rollback).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::debug!("rollback abandoned at the session deadline");
                    return;
                }
            },
            None => rollback.await,
        };
        if let Err(error) = outcome {
            match classify(&error) {
                Failure::Unreachable => {
                    tracing::debug!(error = %error, "rollback skipped; connection is gone")
                }
                _ => tracing::warn!(error = %error, "transaction rollback failed"),
            }
        }
    }

    fn failure(&self, error: neo4rs::Error, statement: &str, params: &Params) -> BackendError {
        to_backend(
            error,
            FailureContext {
                uri: &self.uri,
                principal: &self.principal,
                statement,
                parameter_keys: params.keys(),
            },
        )
    }
}
