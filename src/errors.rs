use thiserror::Error; // Import the `Error` derive macro from the `thiserror` crate

// Errors raised by the path writer when a target path cannot address anything
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    // The whole path is empty or blank
    #[error("path cannot be empty")]
    Empty,

    // One of the dot-separated segments is empty, e.g. `a..b` or `a.`
    #[error("invalid path segment in '{0}'")]
    EmptySegment(String),
}

// Raised when a rendered template is not a valid JSON document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("rendered template is not valid JSON: {detail}")]
    InvalidJson { detail: String },
}

// Failure to obtain any response from a delivery target
#[derive(Debug, Error)]
pub enum DeliveryError {
    // DNS, connect, timeout or body read failure
    #[error("failed to forward webhook: {0}")]
    Transport(String),

    // The HTTP client itself could not be built
    #[error("failed to build http client: {0}")]
    Client(String),
}

// Failure to persist a delivery record
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

// Type alias for configuration results
pub type Result<T> = std::result::Result<T, ConfigError>;
