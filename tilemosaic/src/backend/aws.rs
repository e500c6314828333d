//! Shared AWS client settings for the object-store and wide-column backends.

use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::config::Region;
use aws_smithy_types::timeout::TimeoutConfig;
use std::time::Duration;

/// Overrides applied on top of the SDK's default credential/region chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwsSettings {
    /// Region override (otherwise `AWS_REGION` / profile)
    pub region: Option<String>,
    /// Custom endpoint, e.g. MinIO or LocalStack
    pub endpoint: Option<String>,
    /// Per-operation timeout
    pub timeout: Option<Duration>,
}

impl AwsSettings {
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn timeout_config(&self) -> Option<TimeoutConfig> {
        self.timeout
            .map(|t| TimeoutConfig::builder().operation_timeout(t).build())
    }

    /// Loads the SDK configuration, applying the region override.
    pub(crate) async fn load(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        loader.load().await
    }
}
