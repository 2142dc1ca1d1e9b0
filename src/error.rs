//! Error types for the scoped context and pagination components.

use thiserror::Error;

/// Context resolution and scope lifecycle errors
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Unknown context variable {0:?}")]
    UnknownVariable(String),

    #[error("Context variable {0:?} has already been set in this scope")]
    AlreadyDefined(String),

    #[error("Resources can only be attached inside an entered scope")]
    AttachOutsideScope,

    #[error("Scope exited out of order: handle is for depth {handle}, current depth is {current}")]
    ScopeOrder { handle: usize, current: usize },

    #[error("Context variable {0:?} does not have the requested type")]
    TypeMismatch(String),
}

/// Pagination cursor errors
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("Invalid page cursor token: {token:?}")]
    InvalidToken { token: String },

    #[error("Expected one value per page key, page keys: {properties:?}")]
    ParameterCount { properties: Vec<String> },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}
