//! Tests for SQS client provisioning.

use super::*;
use aws_sdk_sqs::config::Region;
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// ============================================================================
// Test Helper Functions
// ============================================================================

/// Build a client without touching the environment or the network
fn create_test_client(app_name: Option<&'static str>) -> Client {
    let mut builder = aws_sdk_sqs::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"));
    if let Some(name) = app_name {
        builder = builder.app_name(AppName::new(name).unwrap());
    }
    Client::from_conf(builder.build())
}

fn app_name_of(client: &Client) -> Option<String> {
    client.config().app_name().map(|name| name.to_string())
}

/// Factory that counts constructions and tags
#[derive(Default)]
struct CountingFactory {
    created: AtomicUsize,
    tagged: AtomicUsize,
}

#[async_trait]
impl SqsClientFactory for CountingFactory {
    async fn create_client(&self) -> Result<Client, ClientError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        // Widen the window in which concurrent callers race
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(create_test_client(None))
    }

    fn tag_client(&self, client: Client) -> Result<Client, ClientError> {
        self.tagged.fetch_add(1, Ordering::SeqCst);
        SdkClientFactory.tag_client(client)
    }
}

// ============================================================================
// Tagging Tests
// ============================================================================

mod tagging_tests {
    use super::*;

    #[test]
    fn test_marker_used_when_no_app_name() {
        let name = tagged_app_name(None).unwrap();
        assert_eq!(name.to_string(), FRAMEWORK_MARKER);
    }

    #[test]
    fn test_marker_appended_to_existing_app_name() {
        let existing = AppName::new("billing").unwrap();
        let name = tagged_app_name(Some(&existing)).unwrap();
        assert_eq!(name.to_string(), "billing-sqs-active-job");
    }

    #[test]
    fn test_app_name_ending_with_marker_is_still_tagged() {
        let existing = AppName::new("billing-sqs-active-job").unwrap();
        let name = tagged_app_name(Some(&existing)).unwrap();
        assert_eq!(name.to_string(), "billing-sqs-active-job-sqs-active-job");
    }

    #[tokio::test]
    async fn test_sdk_factory_tags_untagged_client() {
        let tagged = SdkClientFactory.tag_client(create_test_client(None)).unwrap();
        assert_eq!(app_name_of(&tagged).as_deref(), Some("sqs-active-job"));
    }

    #[tokio::test]
    async fn test_sdk_factory_keeps_caller_app_name() {
        let tagged = SdkClientFactory
            .tag_client(create_test_client(Some("billing")))
            .unwrap();

        assert_eq!(app_name_of(&tagged).as_deref(), Some("billing-sqs-active-job"));
        assert_eq!(
            tagged.config().region().map(|r| r.as_ref().to_string()),
            Some("us-east-1".to_string())
        );
    }
}

// ============================================================================
// Provisioner Tests
// ============================================================================

mod provisioner_tests {
    use super::*;

    #[tokio::test]
    async fn test_unset_provisioner_builds_on_first_access() {
        let factory = Arc::new(CountingFactory::default());
        let provisioner = ClientProvisioner::new(None, factory.clone());

        assert!(!provisioner.is_set());
        assert!(provisioner.get().is_none());

        let client = provisioner.client().await.unwrap();
        assert_eq!(app_name_of(client).as_deref(), Some("sqs-active-job"));
        assert!(provisioner.is_set());
        assert!(!provisioner.is_supplied());
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(factory.tagged.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_repeated_access_returns_same_instance() {
        let factory = Arc::new(CountingFactory::default());
        let provisioner = ClientProvisioner::new(None, factory.clone());

        let first: *const Client = provisioner.client().await.unwrap();
        for _ in 0..5 {
            let next: *const Client = provisioner.client().await.unwrap();
            assert!(std::ptr::eq(first, next));
        }

        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(factory.tagged.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_access_builds_and_tags_once() {
        let factory = Arc::new(CountingFactory::default());
        let provisioner = Arc::new(ClientProvisioner::new(None, factory.clone()));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let provisioner = provisioner.clone();
            handles.push(tokio::spawn(async move {
                let client = provisioner.client().await.unwrap();
                client as *const Client as usize
            }));
        }

        let mut addresses = Vec::new();
        for handle in handles {
            addresses.push(handle.await.unwrap());
        }

        assert!(addresses.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(factory.tagged.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_supplied_client_is_tagged_not_rebuilt() {
        let mut factory = MockSqsClientFactory::new();
        factory.expect_create_client().never();
        factory
            .expect_tag_client()
            .times(1)
            .returning(|client| SdkClientFactory.tag_client(client));

        let provisioner =
            ClientProvisioner::new(Some(create_test_client(Some("billing"))), Arc::new(factory));
        assert!(provisioner.is_set());
        assert!(provisioner.is_supplied());

        for _ in 0..3 {
            let client = provisioner.client().await.unwrap();
            assert_eq!(app_name_of(client).as_deref(), Some("billing-sqs-active-job"));
        }
    }

    #[tokio::test]
    async fn test_supplied_client_named_like_marker_is_tagged_once() {
        let provisioner = ClientProvisioner::new(
            Some(create_test_client(Some("billing-sqs-active-job"))),
            Arc::new(SdkClientFactory),
        );

        for _ in 0..3 {
            let client = provisioner.client().await.unwrap();
            assert_eq!(
                app_name_of(client).as_deref(),
                Some("billing-sqs-active-job-sqs-active-job")
            );
        }
    }

    #[tokio::test]
    async fn test_replacing_client_resets_provisioner() {
        let factory = Arc::new(CountingFactory::default());
        let mut provisioner = ClientProvisioner::new(None, factory.clone());
        provisioner.client().await.unwrap();

        provisioner.replace_supplied(create_test_client(Some("reports")));

        assert!(provisioner.get().is_none());
        let client = provisioner.client().await.unwrap();
        assert_eq!(app_name_of(client).as_deref(), Some("reports-sqs-active-job"));
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(factory.tagged.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_construction_failure_propagates_and_leaves_unset() {
        let mut factory = MockSqsClientFactory::new();
        factory
            .expect_create_client()
            .times(2)
            .returning(|| Err(ClientError::MissingRegion));
        factory.expect_tag_client().never();

        let provisioner = ClientProvisioner::new(None, Arc::new(factory));

        let result = provisioner.client().await;
        assert!(matches!(result, Err(ClientError::MissingRegion)));
        assert!(!provisioner.is_set());

        // No memoized failure: the next access tries again
        let result = provisioner.client().await;
        assert!(matches!(result, Err(ClientError::MissingRegion)));
    }

    #[tokio::test]
    async fn test_tagging_failure_propagates() {
        let mut factory = MockSqsClientFactory::new();
        factory
            .expect_create_client()
            .times(1)
            .returning(|| Ok(create_test_client(None)));
        factory.expect_tag_client().times(1).returning(|_| {
            Err(ClientError::InvalidAppName {
                message: "bad character".to_string(),
            })
        });

        let provisioner = ClientProvisioner::new(None, Arc::new(factory));

        let result = provisioner.client().await;
        assert!(matches!(result, Err(ClientError::InvalidAppName { .. })));
        assert!(provisioner.get().is_none());
    }
}

// ============================================================================
// SDK Factory Tests
// ============================================================================

mod sdk_factory_tests {
    use super::*;

    /// Verify the default chain picks up the region from the environment
    #[tokio::test]
    #[serial]
    async fn test_sdk_factory_uses_environment_region() {
        std::env::set_var("AWS_REGION", "eu-west-1");

        let result = SdkClientFactory.create_client().await;

        std::env::remove_var("AWS_REGION");

        let client = result.expect("client should build when AWS_REGION is set");
        assert_eq!(
            client.config().region().map(|r| r.as_ref().to_string()),
            Some("eu-west-1".to_string())
        );
    }
}
