use graphstate_core::{BackendError, ConnectionError, ExecutionError};

/// How a driver failure should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Failure {
    Unreachable,
    AuthenticationRejected,
    Statement,
}

/// Context needed to turn a driver failure into a [`BackendError`].
pub(crate) struct FailureContext<'a> {
    pub uri: &'a str,
    pub principal: &'a str,
    pub statement: &'a str,
    pub parameter_keys: Vec<String>,
}

impl FailureContext<'_> {
    pub(crate) fn into_error(self, failure: Failure, reason: String) -> BackendError {
        match failure {
            Failure::Unreachable => BackendError::Connection(ConnectionError::Unreachable {
                uri: self.uri.to_string(),
                reason,
            }),
            Failure::AuthenticationRejected => {
                BackendError::Connection(ConnectionError::AuthenticationRejected {
                    uri: self.uri.to_string(),
                    principal: self.principal.to_string(),
                    reason,
                })
            }
            Failure::Statement => BackendError::Execution(ExecutionError::new(
                self.statement,
                self.parameter_keys,
                reason,
            )),
        }
    }
}

pub(crate) fn classify(error: &neo4rs::Error) -> Failure {
    match error {
        neo4rs::Error::AuthenticationError(_) => Failure::AuthenticationRejected,
        neo4rs::Error::IOError { .. } | neo4rs::Error::ConnectionError => Failure::Unreachable,
        other => classify_message(&other.to_string()),
    }
}

/// Fallback for failures the driver reports only as text.
pub(crate) fn classify_message(message: &str) -> Failure {
    let message = message.to_ascii_lowercase();
    const AUTH_MARKERS: [&str; 3] = [
        "security.unauthorized",
        "authentication failure",
        "authenticationratelimit",
    ];
    const UNREACHABLE_MARKERS: [&str; 5] = [
        "connection refused",
        "connection reset",
        "broken pipe",
        "dns error",
        "serviceunavailable",
    ];

    if AUTH_MARKERS.iter().any(|marker| message.contains(marker)) {
        Failure::AuthenticationRejected
    } else if UNREACHABLE_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
    {
        Failure::Unreachable
    } else {
        Failure::Statement
    }
}

pub(crate) fn to_backend(error: neo4rs::Error, context: FailureContext<'_>) -> BackendError {
    let failure = classify(&error);
    context.into_error(failure, error.to_string())
}
