//! AWS SDK client bundle.

use anyhow::Result;
use aws_config::BehaviorVersion;

/// Bundle of AWS SDK clients sharing one [`aws_config::SdkConfig`], so that
/// credentials are resolved once per cold start.
#[derive(Clone)]
pub struct AwsClients {
    /// Parameter Store client holding keys and certificates.
    pub ssm: aws_sdk_ssm::Client,
    /// IAM client used to mirror server certificates.
    pub iam: aws_sdk_iam::Client,
    /// S3 client holding renewal lists.
    pub s3: aws_sdk_s3::Client,
    /// Step Functions client that starts cascade renewals.
    pub sfn: aws_sdk_sfn::Client,
}

impl AwsClients {
    /// Initialise all AWS SDK clients from the standard credential chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK config cannot be loaded.
    pub async fn init() -> Result<Self> {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;

        Ok(Self {
            ssm: aws_sdk_ssm::Client::new(&config),
            iam: aws_sdk_iam::Client::new(&config),
            s3: aws_sdk_s3::Client::new(&config),
            sfn: aws_sdk_sfn::Client::new(&config),
        })
    }
}
