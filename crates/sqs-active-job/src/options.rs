//! Option layers and their key-wise merge.
//!
//! Each configuration source (built-in defaults, a YAML file, explicit caller
//! overrides) produces a [`ConfigOptions`] layer in which every recognized key
//! is optional. Layers are merged with [`ConfigOptions::merge`], where a key
//! present in the overlay replaces the base value wholesale. Composite values
//! such as `queues` are replaced, never merged entry by entry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default number of messages fetched per poll
pub const DEFAULT_MAX_MESSAGES: u32 = 10;

/// Default seconds to wait for in-flight jobs on shutdown
pub const DEFAULT_SHUTDOWN_TIMEOUT: u64 = 15;

/// Default message group for FIFO queues
pub const DEFAULT_MESSAGE_GROUP_ID: &str = "SqsActiveJobGroup";

/// Callback invoked when an asynchronous enqueue fails
pub type AsyncQueueErrorHandler = Arc<dyn Fn(&anyhow::Error) + Send + Sync>;

/// One layer of configuration options
///
/// Only the serializable options can come from a file; `client`, `logger`
/// and `async_queue_error_handler` are runtime handles set by the caller.
/// Keys the resolver does not recognize are collected in `extra`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ConfigOptions {
    /// Configuration file to load instead of the default locations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,

    /// Job queue name to SQS queue URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queues: Option<BTreeMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_messages: Option<u32>,

    /// Seconds; unset means the queue's own visibility timeout applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility_timeout: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutdown_timeout: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_group_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_deduplication_keys: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_standard_errors: Option<bool>,

    #[serde(skip)]
    pub client: Option<aws_sdk_sqs::Client>,

    #[serde(skip)]
    pub logger: Option<tracing::Dispatch>,

    #[serde(skip)]
    pub async_queue_error_handler: Option<AsyncQueueErrorHandler>,

    /// Unrecognized options, kept as parsed
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ConfigOptions {
    /// Create an empty layer
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in defaults, the lowest-precedence layer
    pub fn defaults() -> Self {
        Self {
            queues: Some(BTreeMap::new()),
            max_messages: Some(DEFAULT_MAX_MESSAGES),
            shutdown_timeout: Some(DEFAULT_SHUTDOWN_TIMEOUT),
            message_group_id: Some(DEFAULT_MESSAGE_GROUP_ID.to_string()),
            excluded_deduplication_keys: Some(vec![crate::dedup::JOB_ID_KEY.to_string()]),
            retry_standard_errors: Some(true),
            ..Self::default()
        }
    }

    /// Merge `overlay` on top of this layer.
    ///
    /// Every key set in `overlay` wins; keys it leaves unset fall through to
    /// `self`. Unrecognized keys follow the same rule.
    pub fn merge(self, overlay: ConfigOptions) -> ConfigOptions {
        let mut extra = self.extra;
        extra.extend(overlay.extra);

        ConfigOptions {
            config_file: overlay.config_file.or(self.config_file),
            queues: overlay.queues.or(self.queues),
            max_messages: overlay.max_messages.or(self.max_messages),
            visibility_timeout: overlay.visibility_timeout.or(self.visibility_timeout),
            shutdown_timeout: overlay.shutdown_timeout.or(self.shutdown_timeout),
            message_group_id: overlay.message_group_id.or(self.message_group_id),
            excluded_deduplication_keys: overlay
                .excluded_deduplication_keys
                .or(self.excluded_deduplication_keys),
            retry_standard_errors: overlay.retry_standard_errors.or(self.retry_standard_errors),
            client: overlay.client.or(self.client),
            logger: overlay.logger.or(self.logger),
            async_queue_error_handler: overlay
                .async_queue_error_handler
                .or(self.async_queue_error_handler),
            extra,
        }
    }

    /// Names of the keys set in this layer
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        let recognized = [
            ("config_file", self.config_file.is_some()),
            ("queues", self.queues.is_some()),
            ("max_messages", self.max_messages.is_some()),
            ("visibility_timeout", self.visibility_timeout.is_some()),
            ("shutdown_timeout", self.shutdown_timeout.is_some()),
            ("message_group_id", self.message_group_id.is_some()),
            (
                "excluded_deduplication_keys",
                self.excluded_deduplication_keys.is_some(),
            ),
            ("retry_standard_errors", self.retry_standard_errors.is_some()),
            ("client", self.client.is_some()),
            ("logger", self.logger.is_some()),
            (
                "async_queue_error_handler",
                self.async_queue_error_handler.is_some(),
            ),
        ];
        for (key, set) in recognized {
            if set {
                keys.push(key.to_string());
            }
        }
        keys.extend(self.extra.keys().cloned());
        keys
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Add a queue mapping, starting a fresh map if none is set
    pub fn with_queue(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.queues
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), url.into());
        self
    }

    pub fn with_max_messages(mut self, max_messages: u32) -> Self {
        self.max_messages = Some(max_messages);
        self
    }

    pub fn with_visibility_timeout(mut self, seconds: u32) -> Self {
        self.visibility_timeout = Some(seconds);
        self
    }

    pub fn with_shutdown_timeout(mut self, seconds: u64) -> Self {
        self.shutdown_timeout = Some(seconds);
        self
    }

    pub fn with_message_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.message_group_id = Some(group_id.into());
        self
    }

    pub fn with_excluded_deduplication_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.excluded_deduplication_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_client(mut self, client: aws_sdk_sqs::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_logger(mut self, logger: tracing::Dispatch) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_async_queue_error_handler(mut self, handler: AsyncQueueErrorHandler) -> Self {
        self.async_queue_error_handler = Some(handler);
        self
    }

    /// Set an option the resolver does not interpret
    pub fn with_extra(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_yaml::Value>,
    ) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for ConfigOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigOptions")
            .field("config_file", &self.config_file)
            .field("queues", &self.queues)
            .field("max_messages", &self.max_messages)
            .field("visibility_timeout", &self.visibility_timeout)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("message_group_id", &self.message_group_id)
            .field(
                "excluded_deduplication_keys",
                &self.excluded_deduplication_keys,
            )
            .field("retry_standard_errors", &self.retry_standard_errors)
            .field("client", &self.client.as_ref().map(|_| "<sqs client>"))
            .field("logger", &self.logger.as_ref().map(|_| "<dispatch>"))
            .field(
                "async_queue_error_handler",
                &self.async_queue_error_handler.as_ref().map(|_| "<handler>"),
            )
            .field("extra", &self.extra)
            .finish()
    }
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
