//! Process launcher backed by the operating system

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use jump_core::traits::{LaunchOutput, LaunchSpec, ProcessLauncher, StdioMode};

/// Runs programs with `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

#[async_trait]
impl ProcessLauncher for SystemLauncher {
    async fn run(&self, spec: &LaunchSpec) -> std::io::Result<LaunchOutput> {
        tracing::debug!(command = %spec, "Launching");

        let mut command = Command::new(&spec.program);
        command.args(&spec.args);

        match spec.stdio {
            StdioMode::Inherit => {
                let status = command
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
                    .await?;
                Ok(LaunchOutput {
                    code: status.code(),
                    ..Default::default()
                })
            }
            StdioMode::Capture => {
                let output = command.stdin(Stdio::null()).output().await?;
                Ok(LaunchOutput {
                    code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
        }
    }
}
