//! Credentials and endpoint for the AWS clients.

use std::fmt;
use url::Url;

/// Connection settings shared by the SNS, SQS and S3 clients.
///
/// Anything left unset falls back to the default AWS provider chain
/// (environment, profile, instance metadata).
#[derive(Clone, Default)]
pub struct AwsConfig {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,
    /// Custom endpoint, e.g. a localstack instance.
    pub endpoint_url: Option<Url>,
}

impl AwsConfig {
    /// Whether a static key pair was configured.
    pub fn has_static_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

impl fmt::Debug for AwsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsConfig")
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}
