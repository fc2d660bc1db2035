//! SSM Run Command and Session Manager

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use jump_core::script::RemoteScript;
use jump_core::traits::{LaunchSpec, RemoteExecutor, SessionRelay};
use jump_core::{BrokerError, GrantReceipt, TargetId};

use super::AwsCli;

/// Document that runs shell commands as root
const RUN_SHELL_DOCUMENT: &str = "AWS-RunShellScript";

/// Session document that relays a TCP port to stdio
const SSH_SESSION_DOCUMENT: &str = "AWS-StartSSHSession";

/// SSM limits command comments to 100 characters
const MAX_COMMENT_LEN: usize = 100;

/// Default `executionTimeout` of `AWS-RunShellScript`
const DEFAULT_EXECUTION_TIMEOUT_SECS: u64 = 3600;

/// Largest `executionTimeout` SSM accepts (48 hours)
const MAX_EXECUTION_TIMEOUT_SECS: u64 = 172_800;

/// Headroom past the sleep for the cleanup steps
const CLEANUP_MARGIN_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendCommandResponse {
    command: SentCommand,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SentCommand {
    command_id: String,
}

/// Runs grant scripts through `ssm send-command` and relays sessions
#[derive(Clone)]
pub struct SsmExecutor {
    cli: AwsCli,
}

impl SsmExecutor {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

impl SessionRelay for SsmExecutor {
    /// `ssm start-session` relaying `port` on `target` over stdio
    fn session(&self, target: &TargetId, port: u16) -> LaunchSpec {
        self.cli.interactive([
            "ssm".to_string(),
            "start-session".to_string(),
            "--target".to_string(),
            target.to_string(),
            "--document-name".to_string(),
            SSH_SESSION_DOCUMENT.to_string(),
            "--parameters".to_string(),
            format!("portNumber={}", port),
        ])
    }
}

/// Run-time limit that lets the script reach its cleanup steps
fn execution_timeout(script: &RemoteScript) -> u64 {
    script
        .duration()
        .as_secs()
        .saturating_add(CLEANUP_MARGIN_SECS)
        .clamp(DEFAULT_EXECUTION_TIMEOUT_SECS, MAX_EXECUTION_TIMEOUT_SECS)
}

fn truncate_comment(comment: &str) -> String {
    comment.chars().take(MAX_COMMENT_LEN).collect()
}

#[async_trait]
impl RemoteExecutor for SsmExecutor {
    async fn dispatch(
        &self,
        target: &TargetId,
        script: &RemoteScript,
        comment: &str,
    ) -> Result<GrantReceipt, BrokerError> {
        let parameters = json!({
            "commands": [script.render()],
            "executionTimeout": [execution_timeout(script).to_string()],
        })
        .to_string();

        let response: SendCommandResponse = self
            .cli
            .run_json([
                "ssm".to_string(),
                "send-command".to_string(),
                "--instance-ids".to_string(),
                target.to_string(),
                "--document-name".to_string(),
                RUN_SHELL_DOCUMENT.to_string(),
                "--comment".to_string(),
                truncate_comment(comment),
                "--parameters".to_string(),
                parameters,
            ])
            .await
            .map_err(|e| BrokerError::GrantDispatch {
                target: target.clone(),
                reason: e.to_string(),
            })?;

        Ok(GrantReceipt {
            command_id: response.command.command_id,
        })
    }
}
