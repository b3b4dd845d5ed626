//! Error types for configuration resolution and client provisioning.

use std::path::PathBuf;
use thiserror::Error;

/// Umbrella error for everything the resolver can fail with
#[derive(Debug, Error)]
pub enum SqsActiveJobError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] ConfigFileError),

    #[error("SQS client error: {0}")]
    Client(#[from] ClientError),
}

impl SqsActiveJobError {
    /// Check if error is transient and should be retried
    ///
    /// Resolution errors point at deployment or authoring mistakes, so none
    /// of them are.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Configuration(_) => false,
            Self::ConfigFile(_) => false,
            Self::Client(_) => false,
        }
    }
}

/// Errors in the resolved option values
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("No queue defined for {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("Invalid queue name '{name}': {message}")]
    InvalidQueueName { name: String, message: String },

    #[error("Invalid value for option '{key}': {message}")]
    InvalidOption { key: String, message: String },
}

/// Errors while reading or parsing a configuration file
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Environment variable '{variable}' referenced in {path} is not set")]
    UnsetVariable { path: PathBuf, variable: String },
}

/// Errors raised while constructing or tagging the SQS client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("No AWS region could be resolved for the SQS client")]
    MissingRegion,

    #[error("Invalid application name for user agent: {message}")]
    InvalidAppName { message: String },

    #[error("SQS client construction failed: {message}")]
    Construction { message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
