use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::{config::LoadError, infra::error::InfraError};

use super::health::RegistryError;

/// Diagnostic chain attached to error responses for the response logger.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_messages(
        source: &'static str,
        status: StatusCode,
        messages: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: messages.into_iter().collect(),
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Errors that stop the process before or while serving.
///
/// Dependency outages never end up here: the health aggregator reports them
/// as data.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variable_message_is_preserved() {
        let err = AppError::from(LoadError::missing("database.host", "DB_HOST"));
        assert_eq!(
            err.to_string(),
            "missing required environment variable: DB_HOST"
        );
    }
}
