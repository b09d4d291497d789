use miette::{Diagnostic, Result};
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Validation error: {0}")]
    #[diagnostic(code(calsync::validation))]
    Validation(String),

    #[error("Network error: {0}")]
    #[diagnostic(code(calsync::network))]
    Network(String),

    #[error("Not found: {0}")]
    #[diagnostic(code(calsync::not_found))]
    NotFound(String),

    #[error("Operation already in flight: {0}")]
    #[diagnostic(code(calsync::busy))]
    Busy(String),

    #[error("Request cancelled: {0}")]
    #[diagnostic(code(calsync::cancelled))]
    Cancelled(String),

    #[error("Environment error: {0}")]
    #[diagnostic(code(calsync::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(calsync::config))]
    Config(String),

    #[error("Component error: {0}")]
    #[diagnostic(code(calsync::component))]
    Component(String),

    #[error(transparent)]
    #[diagnostic(code(calsync::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(calsync::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(calsync::other))]
    Other(String),
}

// Implement From for TOML deserialization errors
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type CalResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create validation errors
pub fn validation_error(message: &str) -> Error {
    Error::Validation(message.to_string())
}

/// Helper to create network errors
pub fn network_error(message: &str) -> Error {
    Error::Network(message.to_string())
}

/// Helper to create not-found errors
pub fn not_found_error(message: &str) -> Error {
    Error::NotFound(message.to_string())
}

/// Helper to create busy errors
pub fn busy_error(message: &str) -> Error {
    Error::Busy(message.to_string())
}

/// Helper to create cancelled errors
pub fn cancelled_error(message: &str) -> Error {
    Error::Cancelled(message.to_string())
}

/// Helper to create component errors
pub fn component_error(message: &str) -> Error {
    Error::Component(message.to_string())
}
