//! Broker configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;
use crate::types::TunnelHandle;

/// Longest grant the command channel can carry out
///
/// SSM caps `executionTimeout` at 48 hours and the cleanup step needs a
/// minute after the sleep.
pub const MAX_GRANT_TTL: Duration = Duration::from_secs(48 * 3600 - 60);

/// Configuration for grants and connections
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// User on the target whose trust store receives the grant
    pub ssh_user: String,

    /// Directory holding the broker key pair
    pub key_dir: PathBuf,

    /// File name of the private key (the public key gets a `.pub` suffix)
    pub key_name: String,

    /// Comment embedded in a freshly generated key
    pub key_comment: String,

    /// How long the public key stays in the remote trust store
    #[serde(with = "duration_secs")]
    pub grant_ttl: Duration,

    /// Pause between grant dispatch and the first connection attempt
    #[serde(with = "duration_secs")]
    pub settle_delay: Duration,

    /// Directory for background tunnel control sockets
    pub control_dir: PathBuf,

    /// Extra `-o` options passed to every ssh invocation
    pub ssh_options: Vec<String>,

    /// Route ssh through `jump proxy %h %p` instead of relying on ~/.ssh/config
    pub inject_proxy_command: bool,

    /// Defaults for `tunnel` and `tunnel-socket`
    pub tunnel: TunnelDefaults,

    /// AWS CLI settings
    pub aws: AwsConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            ssh_user: "ec2-user".to_string(),
            key_dir: dirs::home_dir().unwrap_or_default().join(".ssh"),
            key_name: "aws_ssm_ssh_key".to_string(),
            key_comment: "ec2-ssm".to_string(),
            grant_ttl: Duration::from_secs(120),
            settle_delay: Duration::ZERO,
            control_dir: PathBuf::from("/tmp"),
            tunnel: TunnelDefaults::default(),
            ssh_options: vec![],
            inject_proxy_command: false,
            aws: AwsConfig::default(),
        }
    }
}

impl BrokerConfig {
    /// Path of the private key
    pub fn private_key_path(&self) -> PathBuf {
        self.key_dir.join(&self.key_name)
    }

    /// Control handle for a background tunnel on `host_port`
    pub fn tunnel_handle(&self, host_port: u16) -> TunnelHandle {
        TunnelHandle::for_port(&self.control_dir, host_port)
    }

    /// Reject values that cannot produce a working grant
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grant_ttl.is_zero() {
            return Err(ConfigError::Invalid(
                "grant_ttl must be at least one second".to_string(),
            ));
        }
        if self.grant_ttl > MAX_GRANT_TTL {
            return Err(ConfigError::Invalid(format!(
                "grant_ttl must be at most {} seconds",
                MAX_GRANT_TTL.as_secs()
            )));
        }
        if self.ssh_user.is_empty() {
            return Err(ConfigError::Invalid("ssh_user must not be empty".to_string()));
        }
        if self.key_name.is_empty() || self.key_name.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "key_name '{}' must be a plain file name",
                self.key_name
            )));
        }
        if self.tunnel.port == 0 || self.tunnel.host_port == 0 {
            return Err(ConfigError::Invalid(
                "tunnel ports must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Forward defaults applied when a tunnel request leaves fields unset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelDefaults {
    /// Remote host the forward connects to, as seen from the target
    pub domain: String,
    /// Remote port the forward connects to
    pub port: u16,
    /// Local listening port
    pub host_port: u16,
}

impl Default for TunnelDefaults {
    fn default() -> Self {
        Self {
            domain: "localhost".to_string(),
            port: 5432,
            host_port: 5555,
        }
    }
}

/// Settings forwarded to every `aws` CLI call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// Named profile (`--profile`)
    pub profile: Option<String>,
    /// Region override (`--region`)
    pub region: Option<String>,
}

impl AwsConfig {
    /// Global arguments for the `aws` CLI
    pub fn cli_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(profile) = &self.profile {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }
        if let Some(region) = &self.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.ssh_user, "ec2-user");
        assert_eq!(config.grant_ttl, Duration::from_secs(120));
        assert!(config.private_key_path().ends_with(".ssh/aws_ssm_ssh_key"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_grant_ttl_bounds() {
        let mut config = BrokerConfig::default();
        config.grant_ttl = MAX_GRANT_TTL;
        assert!(config.validate().is_ok());

        for ttl in [Duration::ZERO, MAX_GRANT_TTL + Duration::from_secs(1), Duration::from_secs(u64::MAX)] {
            config.grant_ttl = ttl;
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "ttl {:?} accepted",
                ttl
            );
        }
    }

    #[test]
    fn test_tunnel_handle_uses_control_dir() {
        let mut config = BrokerConfig::default();
        config.control_dir = PathBuf::from("/run/jump");
        assert_eq!(
            config.tunnel_handle(6000).control_path,
            PathBuf::from("/run/jump/6000-control-socket")
        );
    }

    #[test]
    fn test_aws_cli_args() {
        assert!(AwsConfig::default().cli_args().is_empty());

        let aws = AwsConfig {
            profile: Some("ops".to_string()),
            region: Some("eu-west-1".to_string()),
        };
        assert_eq!(
            aws.cli_args(),
            vec!["--profile", "ops", "--region", "eu-west-1"]
        );
    }

    #[test]
    fn test_validate_rejects_bad_key_name() {
        let mut config = BrokerConfig::default();
        config.key_name = "../escape".to_string();
        assert!(config.validate().is_err());
    }
}
