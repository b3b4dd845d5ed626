//! SQS client provisioning.
//!
//! The resolver owns at most one SQS client per configuration. It is either
//! supplied by the caller or built from the default AWS configuration chain
//! on first access. In both cases the client is tagged with the
//! [`FRAMEWORK_MARKER`] in its user agent exactly once, and every later access
//! returns the same instance.
//!
//! ## Thread Safety
//!
//! First access is guarded by [`tokio::sync::OnceCell`], so concurrent callers
//! racing on an unset provisioner still cause a single construction and a
//! single tag.

use crate::error::ClientError;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::config::AppName;
use aws_sdk_sqs::Client;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Application name fragment added to the client's user agent
pub const FRAMEWORK_MARKER: &str = "sqs-active-job";

/// Seam for building and tagging SQS clients
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SqsClientFactory: Send + Sync {
    /// Build a client with default wiring
    async fn create_client(&self) -> Result<Client, ClientError>;

    /// Add the framework marker to the client's user agent
    fn tag_client(&self, client: Client) -> Result<Client, ClientError>;
}

/// Factory backed by the AWS SDK default configuration chain
///
/// Region and credentials come from the environment, shared config files or
/// instance metadata, as resolved by `aws-config`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SdkClientFactory;

#[async_trait]
impl SqsClientFactory for SdkClientFactory {
    async fn create_client(&self) -> Result<Client, ClientError> {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;

        let Some(region) = sdk_config.region() else {
            return Err(ClientError::MissingRegion);
        };
        debug!(region = %region, "Resolved AWS region for SQS client");

        Ok(Client::new(&sdk_config))
    }

    fn tag_client(&self, client: Client) -> Result<Client, ClientError> {
        let app_name = tagged_app_name(client.config().app_name())?;
        let config = client.config().to_builder().app_name(app_name).build();
        Ok(Client::from_conf(config))
    }
}

/// Compute the application name carrying the framework marker
///
/// The marker is appended unconditionally. Callers apply it once per client;
/// [`ClientProvisioner`] guarantees that.
pub fn tagged_app_name(existing: Option<&AppName>) -> Result<AppName, ClientError> {
    let name = match existing {
        None => FRAMEWORK_MARKER.to_string(),
        Some(existing) => format!("{}-{}", existing, FRAMEWORK_MARKER),
    };

    AppName::new(name).map_err(|e| ClientError::InvalidAppName {
        message: e.to_string(),
    })
}

// ============================================================================
// Client Provisioner
// ============================================================================

/// Lazy, memoized holder of the configuration's SQS client
pub struct ClientProvisioner {
    supplied: Option<Client>,
    factory: Arc<dyn SqsClientFactory>,
    client: OnceCell<Client>,
}

impl ClientProvisioner {
    /// Create an unset provisioner
    ///
    /// A `supplied` client is used instead of building one; it is still
    /// tagged on first access.
    pub fn new(supplied: Option<Client>, factory: Arc<dyn SqsClientFactory>) -> Self {
        Self {
            supplied,
            factory,
            client: OnceCell::new(),
        }
    }

    /// Get the client, building and tagging it on first call
    ///
    /// # Errors
    /// Construction and tagging errors from the factory are returned as-is.
    /// A failed first access leaves the provisioner unset.
    pub async fn client(&self) -> Result<&Client, ClientError> {
        self.client
            .get_or_try_init(|| async {
                let client = match &self.supplied {
                    Some(client) => {
                        debug!("Tagging supplied SQS client");
                        client.clone()
                    }
                    None => {
                        info!("Constructing SQS client from default AWS configuration");
                        self.factory.create_client().await?
                    }
                };
                self.factory.tag_client(client)
            })
            .await
    }

    /// Install a caller-supplied client, returning the provisioner to the
    /// unset state
    pub fn replace_supplied(&mut self, client: Client) {
        self.supplied = Some(client);
        self.client = OnceCell::new();
    }

    /// Client if it has already been provisioned
    pub fn get(&self) -> Option<&Client> {
        self.client.get()
    }

    /// Whether the caller supplied the client
    pub fn is_supplied(&self) -> bool {
        self.supplied.is_some()
    }

    /// Whether a client is set, either supplied or already built
    pub fn is_set(&self) -> bool {
        self.supplied.is_some() || self.client.initialized()
    }
}

impl fmt::Debug for ClientProvisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientProvisioner")
            .field("supplied", &self.is_supplied())
            .field("initialized", &self.client.initialized())
            .finish()
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
