use std::fmt;
use std::time::Duration;

use graphstate_core::ConfigError;
use secrecy::{ExposeSecret, SecretString};

pub const URI_ENV: &str = "NEO4J_URI";
pub const USERNAME_ENV: &str = "NEO4J_USERNAME";
pub const LEGACY_USER_ENV: &str = "NEO4J_USER";
pub const PASSWORD_ENV: &str = "NEO4J_PASSWORD";
pub const DATABASE_ENV: &str = "NEO4J_DATABASE";

pub const DEFAULT_MAX_CONNECTIONS: usize = 16;
pub const DEFAULT_FETCH_SIZE: usize = 200;

/// Validated connection parameters. Only obtainable through
/// [`Neo4jConfigBuilder::build`], so an instance is always complete.
#[derive(Clone)]
pub struct Neo4jConfig {
    uri: String,
    user: String,
    password: SecretString,
    database: Option<String>,
    max_connections: usize,
    fetch_size: usize,
    query_timeout: Option<Duration>,
}

impl Neo4jConfig {
    pub fn builder() -> Neo4jConfigBuilder {
        Neo4jConfigBuilder::new()
    }

    /// Reads `NEO4J_URI`, `NEO4J_USERNAME` (or `NEO4J_USER`), `NEO4J_PASSWORD`
    /// and the optional `NEO4J_DATABASE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`Neo4jConfig::from_env`] with a caller-supplied variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let user = lookup(USERNAME_ENV).or_else(|| lookup(LEGACY_USER_ENV));
        let mut builder = Neo4jConfigBuilder::new();
        builder.uri = lookup(URI_ENV);
        builder.user = user;
        builder.password = lookup(PASSWORD_ENV).map(SecretString::new);
        builder.database = lookup(DATABASE_ENV).filter(|database| !database.trim().is_empty());
        builder.build()
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn fetch_size(&self) -> usize {
        self.fetch_size
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout
    }
}

impl fmt::Debug for Neo4jConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neo4jConfig")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("fetch_size", &self.fetch_size)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

#[derive(Clone)]
pub struct Neo4jConfigBuilder {
    uri: Option<String>,
    user: Option<String>,
    password: Option<SecretString>,
    database: Option<String>,
    max_connections: usize,
    fetch_size: usize,
    query_timeout: Option<Duration>,
}

impl Default for Neo4jConfigBuilder {
    fn default() -> Self {
        Self {
            uri: None,
            user: None,
            password: None,
            database: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            fetch_size: DEFAULT_FETCH_SIZE,
            query_timeout: None,
        }
    }
}

impl fmt::Debug for Neo4jConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_some() {
            "<redacted>"
        } else {
            "<none>"
        };

        f.debug_struct("Neo4jConfigBuilder")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &password)
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("fetch_size", &self.fetch_size)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

impl Neo4jConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uri(mut self, value: impl Into<String>) -> Self {
        self.uri = Some(value.into());
        self
    }

    pub fn user(mut self, value: impl Into<String>) -> Self {
        self.user = Some(value.into());
        self
    }

    pub fn password(mut self, value: impl Into<String>) -> Self {
        self.password = Some(SecretString::new(value.into()));
        self
    }

    pub fn database(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        self.database = if value.trim().is_empty() {
            None
        } else {
            Some(value)
        };
        self
    }

    /// Sets the uri from `var` when it is present.
    pub fn uri_from_env(mut self, var: &str) -> Self {
        if let Ok(value) = std::env::var(var) {
            self.uri = Some(value);
        }
        self
    }

    pub fn user_from_env(mut self, var: &str) -> Self {
        if let Ok(value) = std::env::var(var) {
            self.user = Some(value);
        }
        self
    }

    pub fn password_from_env(mut self, var: &str) -> Self {
        if let Ok(value) = std::env::var(var) {
            self.password = Some(SecretString::new(value));
        }
        self
    }

    pub fn max_connections(mut self, value: usize) -> Self {
        self.max_connections = value;
        self
    }

    pub fn fetch_size(mut self, value: usize) -> Self {
        self.fetch_size = value;
        self
    }

    /// Deadline applied to every session. Unset means no client-side limit.
    pub fn query_timeout(mut self, value: Duration) -> Self {
        self.query_timeout = Some(value);
        self
    }

    pub fn build(self) -> Result<Neo4jConfig, ConfigError> {
        let uri = required("uri", self.uri)?;
        let user = required("user", self.user)?;
        let password = self.password.ok_or(ConfigError::Missing("password"))?;
        if password.expose_secret().trim().is_empty() {
            return Err(ConfigError::Empty("password"));
        }

        if !uri.contains("://") {
            return Err(ConfigError::Invalid {
                field: "uri",
                reason: format!("'{uri}' has no scheme (expected bolt://, neo4j:// or similar)"),
            });
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid {
                field: "max_connections",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.fetch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "fetch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.query_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::Invalid {
                field: "query_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Neo4jConfig {
            uri,
            user,
            password,
            database: self.database,
            max_connections: self.max_connections,
            fetch_size: self.fetch_size,
            query_timeout: self.query_timeout,
        })
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    let value = value.ok_or(ConfigError::Missing(field))?;
    if value.trim().is_empty() {
        return Err(ConfigError::Empty(field));
    }
    Ok(value)
}
