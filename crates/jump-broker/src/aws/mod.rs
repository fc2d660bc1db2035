//! AWS collaborators via the `aws` CLI
//!
//! Each service adapter shells out to `aws ... --output json` and parses the
//! response with serde.

mod ec2;
mod ssm;
mod sts;

pub use ec2::Ec2Discovery;
pub use ssm::SsmExecutor;
pub use sts::StsIdentity;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;

use jump_core::config::AwsConfig;
use jump_core::traits::{LaunchSpec, ProcessLauncher};

/// Failure of a single `aws` invocation
#[derive(Error, Debug)]
pub enum AwsCliError {
    /// The CLI could not be started
    #[error("failed to run aws: {0}")]
    Spawn(#[from] std::io::Error),

    /// The CLI exited non-zero
    #[error("aws {status}: {stderr}")]
    Failed { status: String, stderr: String },

    /// The CLI output was not the expected JSON
    #[error("unexpected aws output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Thin wrapper around the `aws` executable
#[derive(Clone)]
pub struct AwsCli {
    program: String,
    config: AwsConfig,
    launcher: Arc<dyn ProcessLauncher>,
}

impl AwsCli {
    pub fn new(config: AwsConfig, launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self {
            program: "aws".to_string(),
            config,
            launcher,
        }
    }

    /// Use a different executable (e.g. a pinned `aws` v2 path)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn args<I, S>(&self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all = self.config.cli_args();
        all.extend(args.into_iter().map(Into::into));
        all
    }

    /// An interactive invocation sharing the caller's stdio
    pub fn interactive<I, S>(&self, args: I) -> LaunchSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LaunchSpec::inherit(&self.program, self.args(args))
    }

    /// Run a command and parse its JSON output
    pub async fn run_json<T, I, S>(&self, args: I) -> Result<T, AwsCliError>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = self.args(args);
        args.push("--output".to_string());
        args.push("json".to_string());
        let spec = LaunchSpec::capture(&self.program, args);

        tracing::debug!(command = %spec, "Calling aws");
        let output = self.launcher.run(&spec).await?;
        if !output.success() {
            return Err(AwsCliError::Failed {
                status: output.status_text(),
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(serde_json::from_str(&output.stdout)?)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::CannedLauncher;
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Echo {
        value: u32,
    }

    #[tokio::test]
    async fn test_run_json_appends_output_and_globals() {
        let launcher = CannedLauncher::stdout(r#"{"value": 7}"#);
        let config = AwsConfig {
            profile: Some("ops".to_string()),
            region: None,
        };
        let cli = AwsCli::new(config, launcher.clone());

        let echo: Echo = cli.run_json(["sts", "get-caller-identity"]).await.unwrap();
        assert_eq!(echo.value, 7);
        assert_eq!(
            launcher.last().to_string(),
            "aws --profile ops sts get-caller-identity --output json"
        );
    }

    #[tokio::test]
    async fn test_run_json_nonzero_exit() {
        let launcher = CannedLauncher::failing(255, "Unable to locate credentials\n");
        let cli = AwsCli::new(AwsConfig::default(), launcher);
        let err = cli.run_json::<Echo, _, _>(["sts"]).await.unwrap_err();
        match err {
            AwsCliError::Failed { status, stderr } => {
                assert_eq!(status, "exit status: 255");
                assert_eq!(stderr, "Unable to locate credentials");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_json_bad_output() {
        let launcher = CannedLauncher::stdout("not json");
        let cli = AwsCli::new(AwsConfig::default(), launcher);
        assert!(matches!(
            cli.run_json::<Echo, _, _>(["sts"]).await,
            Err(AwsCliError::Parse(_))
        ));
    }
}
