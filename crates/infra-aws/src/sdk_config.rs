// Shared AWS SDK configuration

use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_sqs::config::{Credentials, Region};
use tracing::info;

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

const STATIC_CREDENTIALS_PROVIDER: &str = "msgdelivery-env";

/// Region and optional static credentials
#[derive(Debug, Clone, Default)]
pub struct AwsSettings {
    pub region: Option<String>,
    /// Static key pair; `None` uses the default credential chain
    pub static_credentials: Option<(String, String)>,
}

/// Load the SDK config shared by the SQS and ECS clients
pub async fn load_aws_config(settings: &AwsSettings) -> SdkConfig {
    let region = settings
        .region
        .clone()
        .filter(|region| !region.is_empty())
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.clone()));

    match &settings.static_credentials {
        Some((access_key, secret_key)) => {
            info!(region = %region, "Using static AWS credentials");
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                STATIC_CREDENTIALS_PROVIDER,
            ));
        }
        None => info!(region = %region, "Using default AWS credential chain"),
    }

    loader.load().await
}
