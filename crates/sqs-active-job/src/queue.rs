//! Queue identifiers: job queue names and the SQS URLs they map to.

use crate::error::ConfigurationError;
use std::borrow::Borrow;
use std::str::FromStr;

/// Suffix that marks an SQS FIFO queue
pub const FIFO_SUFFIX: &str = ".fifo";

/// Reduce an option key or identifier to its canonical string form.
///
/// Configuration written for Ruby-based tooling spells identifiers as symbol
/// literals (`:orders`); a single leading colon is dropped so both spellings
/// name the same key.
pub(crate) fn canonical_key(raw: &str) -> &str {
    raw.strip_prefix(':').unwrap_or(raw)
}

/// Check whether a queue URL points at a FIFO queue.
///
/// Exact, case-sensitive suffix test. Trailing slashes and query strings are
/// not normalized away.
pub fn is_fifo(queue_url: &str) -> bool {
    queue_url.ends_with(FIFO_SUFFIX)
}

// ============================================================================
// Job Queue Names
// ============================================================================

/// Validated job queue name in canonical key form
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobQueueName(String);

impl JobQueueName {
    /// Create new job queue name with normalization and validation
    pub fn new(name: impl AsRef<str>) -> Result<Self, ConfigurationError> {
        let raw = name.as_ref();
        let canonical = canonical_key(raw);

        if canonical.is_empty() {
            return Err(ConfigurationError::InvalidQueueName {
                name: raw.to_string(),
                message: "must not be empty".to_string(),
            });
        }

        if canonical
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(ConfigurationError::InvalidQueueName {
                name: raw.to_string(),
                message: "must not contain whitespace or control characters".to_string(),
            });
        }

        Ok(Self(canonical.to_string()))
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobQueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobQueueName {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for JobQueueName {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JobQueueName> for String {
    fn from(name: JobQueueName) -> Self {
        name.0
    }
}

impl Borrow<str> for JobQueueName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Queue URLs
// ============================================================================

/// SQS queue endpoint URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueUrl(String);

impl QueueUrl {
    /// Create queue URL, rejecting blank values
    pub fn new(url: impl Into<String>) -> Result<Self, ConfigurationError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(ConfigurationError::InvalidOption {
                key: "queues".to_string(),
                message: "queue URL must not be empty".to_string(),
            });
        }
        Ok(Self(url))
    }

    /// Check if this URL points at a FIFO queue
    pub fn is_fifo(&self) -> bool {
        is_fifo(&self.0)
    }

    /// Get URL as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for QueueUrl {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QueueUrl> for String {
    fn from(url: QueueUrl) -> Self {
        url.0
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
