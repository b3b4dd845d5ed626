//! Layered configuration resolution.
//!
//! [`ConfigurationResolver`] combines three option layers, highest precedence
//! first:
//!
//! 1. explicit options supplied by the caller,
//! 2. the YAML configuration file, if one is found (see [`crate::loader`]),
//! 3. built-in defaults.
//!
//! The merged layer is validated and stored in a typed
//! [`ResolvedConfiguration`], which is built once at startup and then shared
//! with consumers, typically as `Arc<ResolvedConfiguration>`.

use crate::client::{ClientProvisioner, SdkClientFactory, SqsClientFactory};
use crate::dedup::DeduplicationKeys;
use crate::error::{ClientError, ConfigurationError, SqsActiveJobError};
use crate::loader::{load_options_file, select_config_file, AppEnvironment, CONFIG_FILE_ENV};
use crate::options::{
    AsyncQueueErrorHandler, ConfigOptions, DEFAULT_MAX_MESSAGES, DEFAULT_MESSAGE_GROUP_ID,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
use crate::queue::{canonical_key, is_fifo, JobQueueName, QueueUrl};
use aws_sdk_sqs::Client;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

// ============================================================================
// Resolved Configuration
// ============================================================================

/// Final, validated configuration for the SQS job integration
pub struct ResolvedConfiguration {
    config_file: Option<PathBuf>,
    queues: BTreeMap<JobQueueName, QueueUrl>,
    max_messages: u32,
    visibility_timeout: Option<u32>,
    shutdown_timeout: u64,
    message_group_id: String,
    excluded_deduplication_keys: DeduplicationKeys,
    retry_standard_errors: bool,
    client: ClientProvisioner,
    logger: Option<tracing::Dispatch>,
    async_queue_error_handler: Option<AsyncQueueErrorHandler>,
    extra: BTreeMap<String, serde_yaml::Value>,
}

impl ResolvedConfiguration {
    /// Build from a fully merged option layer
    ///
    /// # Errors
    /// Returns the first invalid queue name, queue URL or option value.
    pub fn from_options(
        options: ConfigOptions,
        client_factory: Arc<dyn SqsClientFactory>,
    ) -> Result<Self, ConfigurationError> {
        let queues = validate_queues(options.queues.unwrap_or_default())?;
        let max_messages =
            validate_max_messages(options.max_messages.unwrap_or(DEFAULT_MAX_MESSAGES))?;

        Ok(Self {
            config_file: options.config_file,
            queues,
            max_messages,
            visibility_timeout: options.visibility_timeout,
            shutdown_timeout: options.shutdown_timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT),
            message_group_id: options
                .message_group_id
                .unwrap_or_else(|| DEFAULT_MESSAGE_GROUP_ID.to_string()),
            excluded_deduplication_keys: options
                .excluded_deduplication_keys
                .map(DeduplicationKeys::from)
                .unwrap_or_default(),
            retry_standard_errors: options.retry_standard_errors.unwrap_or(true),
            client: ClientProvisioner::new(options.client, client_factory),
            logger: options.logger,
            async_queue_error_handler: options.async_queue_error_handler,
            extra: options.extra,
        })
    }

    // ------------------------------------------------------------------------
    // Derived values
    // ------------------------------------------------------------------------

    /// Look up the SQS URL for a job queue
    ///
    /// The name is reduced to its canonical key first, so `":orders"` and
    /// `"orders"` find the same queue. There is no fallback queue.
    ///
    /// # Errors
    /// `ConfigurationError::QueueNotFound` if no queue has that name.
    pub fn queue_url_for(&self, queue_name: &str) -> Result<&QueueUrl, ConfigurationError> {
        let key = canonical_key(queue_name);
        self.queues
            .get(key)
            .ok_or_else(|| ConfigurationError::QueueNotFound {
                queue_name: key.to_string(),
            })
    }

    /// Check whether a queue URL points at a FIFO queue
    pub fn is_fifo(&self, queue_url: &str) -> bool {
        is_fifo(queue_url)
    }

    /// Message group id to send with jobs for `queue_name`
    ///
    /// `None` for standard queues, which do not accept a group id.
    pub fn message_group_id_for(
        &self,
        queue_name: &str,
    ) -> Result<Option<&str>, ConfigurationError> {
        let url = self.queue_url_for(queue_name)?;
        Ok(url.is_fifo().then_some(self.message_group_id.as_str()))
    }

    /// Get the SQS client, provisioning and tagging it on first access
    pub async fn client(&self) -> Result<&Client, ClientError> {
        self.client.client().await
    }

    // ------------------------------------------------------------------------
    // Getters
    // ------------------------------------------------------------------------

    /// File the file layer was loaded from, if any
    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    pub fn queues(&self) -> &BTreeMap<JobQueueName, QueueUrl> {
        &self.queues
    }

    pub fn max_messages(&self) -> u32 {
        self.max_messages
    }

    pub fn visibility_timeout(&self) -> Option<u32> {
        self.visibility_timeout
    }

    pub fn shutdown_timeout(&self) -> u64 {
        self.shutdown_timeout
    }

    pub fn message_group_id(&self) -> &str {
        &self.message_group_id
    }

    pub fn excluded_deduplication_keys(&self) -> &DeduplicationKeys {
        &self.excluded_deduplication_keys
    }

    pub fn retry_standard_errors(&self) -> bool {
        self.retry_standard_errors
    }

    pub fn client_provisioner(&self) -> &ClientProvisioner {
        &self.client
    }

    pub fn logger(&self) -> Option<&tracing::Dispatch> {
        self.logger.as_ref()
    }

    pub fn async_queue_error_handler(&self) -> Option<&AsyncQueueErrorHandler> {
        self.async_queue_error_handler.as_ref()
    }

    /// Options the resolver does not interpret, as parsed
    pub fn extra(&self) -> &BTreeMap<String, serde_yaml::Value> {
        &self.extra
    }

    // ------------------------------------------------------------------------
    // Setters
    // ------------------------------------------------------------------------

    /// Replace the whole queue map
    ///
    /// Nothing is changed if any entry is invalid.
    pub fn set_queues<I, N, U>(&mut self, queues: I) -> Result<(), ConfigurationError>
    where
        I: IntoIterator<Item = (N, U)>,
        N: AsRef<str>,
        U: Into<String>,
    {
        let mut validated = BTreeMap::new();
        for (name, url) in queues {
            insert_queue(&mut validated, name.as_ref(), url.into())?;
        }
        self.queues = validated;
        Ok(())
    }

    /// Add or replace a single queue mapping
    pub fn set_queue(
        &mut self,
        name: &str,
        url: impl Into<String>,
    ) -> Result<(), ConfigurationError> {
        let name = JobQueueName::new(name)?;
        let url = QueueUrl::new(url)?;
        self.queues.insert(name, url);
        Ok(())
    }

    pub fn set_max_messages(&mut self, max_messages: u32) -> Result<(), ConfigurationError> {
        self.max_messages = validate_max_messages(max_messages)?;
        Ok(())
    }

    /// `None` defers to the queue's own visibility timeout
    pub fn set_visibility_timeout(&mut self, seconds: Option<u32>) {
        self.visibility_timeout = seconds;
    }

    pub fn set_shutdown_timeout(&mut self, seconds: u64) {
        self.shutdown_timeout = seconds;
    }

    pub fn set_message_group_id(&mut self, group_id: impl Into<String>) {
        self.message_group_id = group_id.into();
    }

    /// Replace the excluded keys; `job_id` is always added back
    pub fn set_excluded_deduplication_keys<I, K>(&mut self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        self.excluded_deduplication_keys = DeduplicationKeys::new(keys);
    }

    pub fn set_retry_standard_errors(&mut self, retry: bool) {
        self.retry_standard_errors = retry;
    }

    /// Supply a client; it is tagged on the next access
    pub fn set_client(&mut self, client: Client) {
        self.client.replace_supplied(client);
    }

    pub fn set_logger(&mut self, logger: Option<tracing::Dispatch>) {
        self.logger = logger;
    }

    pub fn set_async_queue_error_handler(&mut self, handler: Option<AsyncQueueErrorHandler>) {
        self.async_queue_error_handler = handler;
    }

    /// Store an option the resolver does not interpret
    pub fn set_extra(&mut self, key: &str, value: impl Into<serde_yaml::Value>) {
        self.extra
            .insert(canonical_key(key).to_string(), value.into());
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    /// Flat map of every set attribute
    ///
    /// Unset optional values are left out: an absent `visibility_timeout`, a
    /// client that was neither supplied nor built yet, and absent runtime
    /// handles. Runtime handles are rendered as type descriptions.
    pub fn to_h(&self) -> BTreeMap<String, Value> {
        let mut map: BTreeMap<String, Value> = self
            .extra
            .iter()
            .map(|(key, value)| (key.clone(), yaml_to_json(value)))
            .collect();

        if let Some(path) = &self.config_file {
            map.insert("config_file".to_string(), json!(path.display().to_string()));
        }

        let queues: serde_json::Map<String, Value> = self
            .queues
            .iter()
            .map(|(name, url)| (name.to_string(), json!(url.as_str())))
            .collect();
        map.insert("queues".to_string(), Value::Object(queues));
        map.insert("max_messages".to_string(), json!(self.max_messages));
        if let Some(seconds) = self.visibility_timeout {
            map.insert("visibility_timeout".to_string(), json!(seconds));
        }
        map.insert("shutdown_timeout".to_string(), json!(self.shutdown_timeout));
        map.insert("message_group_id".to_string(), json!(self.message_group_id));
        map.insert(
            "excluded_deduplication_keys".to_string(),
            json!(self.excluded_deduplication_keys.iter().collect::<Vec<_>>()),
        );
        map.insert(
            "retry_standard_errors".to_string(),
            json!(self.retry_standard_errors),
        );

        if self.client.is_set() {
            map.insert("client".to_string(), json!("aws_sdk_sqs::Client"));
        }
        if self.logger.is_some() {
            map.insert("logger".to_string(), json!("tracing::Dispatch"));
        }
        if self.async_queue_error_handler.is_some() {
            map.insert(
                "async_queue_error_handler".to_string(),
                json!("Fn(&anyhow::Error)"),
            );
        }

        map
    }
}

/// Renders [`ResolvedConfiguration::to_h`] as compact JSON
impl fmt::Display for ResolvedConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string(&self.to_h()).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

impl fmt::Debug for ResolvedConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfiguration")
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
            .field("client", &self.client)
            .field("logger", &self.logger.as_ref().map(|_| "<dispatch>"))
            .field(
                "async_queue_error_handler",
                &self.async_queue_error_handler.as_ref().map(|_| "<handler>"),
            )
            .field("extra", &self.extra)
            .finish()
    }
}

/// Convert a YAML value for display
///
/// Non-string mapping keys become their YAML text; `.nan` and `.inf` become
/// strings, which JSON numbers cannot represent.
fn yaml_to_json(value: &serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(flag) => Value::Bool(*flag),
        Yaml::Number(number) => {
            if let Some(n) = number.as_u64() {
                json!(n)
            } else if let Some(n) = number.as_i64() {
                json!(n)
            } else {
                number
                    .as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(number.to_string()))
            }
        }
        Yaml::String(text) => Value::String(text.clone()),
        Yaml::Sequence(items) => Value::Array(items.iter().map(yaml_to_json).collect()),
        Yaml::Mapping(mapping) => Value::Object(
            mapping
                .iter()
                .map(|(key, value)| (yaml_key_to_string(key), yaml_to_json(value)))
                .collect(),
        ),
        Yaml::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

fn yaml_key_to_string(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(text) => text.clone(),
        serde_yaml::Value::Number(number) => number.to_string(),
        serde_yaml::Value::Bool(flag) => flag.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|text| text.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn validate_queues(
    raw: BTreeMap<String, String>,
) -> Result<BTreeMap<JobQueueName, QueueUrl>, ConfigurationError> {
    let mut queues = BTreeMap::new();
    for (name, url) in raw {
        insert_queue(&mut queues, &name, url)?;
    }
    Ok(queues)
}

/// Insert one mapping, rejecting names that collide after normalization
fn insert_queue(
    queues: &mut BTreeMap<JobQueueName, QueueUrl>,
    name: &str,
    url: String,
) -> Result<(), ConfigurationError> {
    let queue_name = JobQueueName::new(name)?;
    let url = QueueUrl::new(url)?;
    if queues.contains_key(&queue_name) {
        return Err(ConfigurationError::InvalidQueueName {
            name: name.to_string(),
            message: format!("'{}' is defined more than once", queue_name),
        });
    }
    queues.insert(queue_name, url);
    Ok(())
}

fn validate_max_messages(max_messages: u32) -> Result<u32, ConfigurationError> {
    if max_messages == 0 {
        return Err(ConfigurationError::InvalidOption {
            key: "max_messages".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(max_messages)
}

// ============================================================================
// Resolver
// ============================================================================

/// Builds a [`ResolvedConfiguration`] from defaults, file and explicit options
#[derive(Clone)]
pub struct ConfigurationResolver {
    environment: AppEnvironment,
    client_factory: Arc<dyn SqsClientFactory>,
}

impl ConfigurationResolver {
    /// Create a resolver using the AWS SDK default client wiring
    pub fn new(environment: AppEnvironment) -> Self {
        Self {
            environment,
            client_factory: Arc::new(SdkClientFactory),
        }
    }

    /// Create a resolver for the environment named by `APP_ENV`
    ///
    /// # Errors
    /// Returns the I/O error if the working directory cannot be determined.
    pub fn from_env() -> std::io::Result<Self> {
        Ok(Self::new(AppEnvironment::from_env()?))
    }

    /// Use a different factory for building and tagging the client
    pub fn with_client_factory(mut self, factory: Arc<dyn SqsClientFactory>) -> Self {
        self.client_factory = factory;
        self
    }

    pub fn environment(&self) -> &AppEnvironment {
        &self.environment
    }

    /// Resolve the configuration, loading the file layer if one is found
    ///
    /// # Errors
    /// - `SqsActiveJobError::ConfigFile` - The selected file could not be read or parsed
    /// - `SqsActiveJobError::Configuration` - A merged value failed validation
    pub fn resolve(
        &self,
        explicit: ConfigOptions,
    ) -> Result<ResolvedConfiguration, SqsActiveJobError> {
        let env_override = std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from);
        let path = select_config_file(
            explicit.config_file.as_deref(),
            env_override.as_deref(),
            &self.environment,
        );

        let file = match &path {
            Some(path) => load_options_file(path)?,
            None => ConfigOptions::new(),
        };

        let mut resolved = self.resolve_layers(explicit, file, ConfigOptions::defaults())?;
        resolved.config_file = path;

        info!(
            environment = %self.environment.name(),
            config_file = ?resolved.config_file,
            queues = resolved.queues.len(),
            "Resolved SQS Active Job configuration"
        );
        Ok(resolved)
    }

    /// Merge already loaded layers and validate the result
    pub fn resolve_layers(
        &self,
        explicit: ConfigOptions,
        file: ConfigOptions,
        defaults: ConfigOptions,
    ) -> Result<ResolvedConfiguration, ConfigurationError> {
        debug!(
            explicit_keys = ?explicit.keys(),
            file_keys = ?file.keys(),
            "Merging configuration layers"
        );

        let merged = defaults.merge(file).merge(explicit);
        ResolvedConfiguration::from_options(merged, self.client_factory.clone())
    }
}

impl fmt::Debug for ConfigurationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationResolver")
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "configuration_tests.rs"]
mod tests;
