//! # SQS Active Job
//!
//! Configuration resolver for job queues backed by Amazon SQS.
//!
//! This library provides:
//! - Layered option resolution (defaults, YAML file, explicit overrides)
//! - Job queue name to SQS queue URL lookup
//! - FIFO queue detection and message group selection
//! - Deduplication key sets that always exclude `job_id`
//! - Lazy, race-free provisioning of a tagged SQS client
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for resolution and client provisioning
//! - [`queue`] - Job queue names and queue URLs
//! - [`dedup`] - Keys excluded from FIFO deduplication
//! - [`options`] - Option layers and their merge
//! - [`loader`] - Configuration file discovery and loading
//! - [`client`] - SQS client construction and tagging
//! - [`configuration`] - The resolver and the resolved configuration
//!
//! ## Example
//!
//! ```no_run
//! use sqs_active_job::{ConfigOptions, ConfigurationResolver};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigurationResolver::from_env()?
//!     .resolve(ConfigOptions::new().with_max_messages(5))?;
//! let config = Arc::new(config);
//!
//! let url = config.queue_url_for("default")?;
//! println!("default queue: {}", url);
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod client;
pub mod configuration;
pub mod dedup;
pub mod error;
pub mod loader;
pub mod options;
pub mod queue;

// Re-export commonly used types at crate root for convenience
pub use client::{ClientProvisioner, SdkClientFactory, SqsClientFactory, FRAMEWORK_MARKER};
pub use configuration::{ConfigurationResolver, ResolvedConfiguration};
pub use dedup::{DeduplicationKeys, JOB_ID_KEY};
pub use error::{ClientError, ConfigFileError, ConfigurationError, SqsActiveJobError};
pub use loader::{AppEnvironment, APP_ENV_VAR, CONFIG_FILE_ENV, DEFAULT_APP_ENV};
pub use options::{
    AsyncQueueErrorHandler, ConfigOptions, DEFAULT_MAX_MESSAGES, DEFAULT_MESSAGE_GROUP_ID,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use queue::{is_fifo, JobQueueName, QueueUrl, FIFO_SUFFIX};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
