//! STS caller identity

use async_trait::async_trait;
use serde::Deserialize;

use jump_core::traits::IdentityProvider;
use jump_core::BrokerError;

use super::AwsCli;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentity {
    arn: String,
}

/// Reads the caller ARN from `sts get-caller-identity`
#[derive(Clone)]
pub struct StsIdentity {
    cli: AwsCli,
}

impl StsIdentity {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl IdentityProvider for StsIdentity {
    async fn caller_principal(&self) -> Result<String, BrokerError> {
        let identity: CallerIdentity = self
            .cli
            .run_json(["sts", "get-caller-identity"])
            .await
            .map_err(|e| BrokerError::IdentityUnavailable(e.to_string()))?;
        Ok(identity.arn)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::CannedLauncher;
    use super::*;
    use jump_core::config::AwsConfig;

    #[tokio::test]
    async fn test_reads_arn() {
        let launcher = CannedLauncher::stdout(
            r#"{"UserId": "AIDA", "Account": "123456789012", "Arn": "arn:aws:iam::123456789012:user/dave"}"#,
        );
        let sts = StsIdentity::new(AwsCli::new(AwsConfig::default(), launcher));
        assert_eq!(
            sts.caller_principal().await.unwrap(),
            "arn:aws:iam::123456789012:user/dave"
        );
    }

    #[tokio::test]
    async fn test_missing_arn_is_unavailable() {
        let launcher = CannedLauncher::stdout(r#"{"Account": "1"}"#);
        let sts = StsIdentity::new(AwsCli::new(AwsConfig::default(), launcher));
        assert!(matches!(
            sts.caller_principal().await,
            Err(BrokerError::IdentityUnavailable(_))
        ));
    }
}
