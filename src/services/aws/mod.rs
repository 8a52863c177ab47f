//! AWS-backed implementations of the provider capabilities.
//!
//! Credentials come from the standard provider chain. Every client shares one
//! `SdkConfig` with a generous retry budget, since RDS throttles log
//! downloads aggressively.

pub mod rds;
pub mod s3;

use aws_config::{BehaviorVersion, Region, SdkConfig, retry::RetryConfig};
use aws_sdk_sts::error::DisplayErrorContext;
use tracing::{debug, error};

use crate::errors::{RecorderError, RecorderResult};

pub use rds::AwsDbLogSource;
pub use s3::AwsObjectStore;

pub const DEFAULT_REGION: &str = "sa-east-1";
pub const MAX_ATTEMPTS: u32 = 200;

/// Load the shared SDK configuration for `region`.
pub async fn load_provider_config(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .retry_config(RetryConfig::standard().with_max_attempts(MAX_ATTEMPTS))
        .load()
        .await
}

/// Fail fast when the credential chain yields nothing usable.
pub async fn verify_credentials(config: &SdkConfig) -> RecorderResult<()> {
    let identity = aws_sdk_sts::Client::new(config)
        .get_caller_identity()
        .send()
        .await
        .map_err(|err| {
            error!(error = %DisplayErrorContext(&err), "unable to validate the aws credentials");
            RecorderError::Credentials(DisplayErrorContext(&err).to_string())
        })?;

    debug!(
        account = identity.account().unwrap_or_default(),
        arn = identity.arn().unwrap_or_default(),
        "aws credentials are valid"
    );
    Ok(())
}
