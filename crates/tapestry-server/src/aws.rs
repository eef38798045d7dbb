//! AWS SDK bootstrap
//!
//! Loads region and credentials from the environment (or the default
//! provider chain) once at startup, for components that target
//! cloud-hosted storage. Nothing here fails hard: a machine with no AWS
//! environment still runs ingestion.

use aws_config::meta::region::RegionProviderChain;
use aws_config::SdkConfig;
use tracing::info;

/// Region used when neither `AWS_REGION` nor a profile supplies one.
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Resolve the shared AWS configuration.
pub async fn init_aws_config() -> SdkConfig {
    let region_provider =
        RegionProviderChain::default_provider().or_else(DEFAULT_AWS_REGION);
    let config = aws_config::from_env().region(region_provider).load().await;

    info!(
        region = %config
            .region()
            .map(|r| r.as_ref().to_string())
            .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string()),
        "AWS SDK configured"
    );

    config
}
