//! Connection orchestration
//!
//! One request, one grant, one local process. Requests are validated before
//! anything leaves the machine, and no ssh process starts unless the grant
//! was accepted by the command channel.

use std::sync::Arc;

use jump_core::config::BrokerConfig;
use jump_core::traits::{LaunchOutput, LaunchSpec, ProcessLauncher, SessionRelay};
use jump_core::{
    BrokerError, ConnectPlan, ConnectionMode, ConnectionRequest, KeyPair, TargetId, TunnelHandle,
};

use crate::grant::GrantIssuer;
use crate::keystore::KeyStore;
use crate::ssh::SshArgs;

/// Exit code ssh uses for its own failures, as opposed to the remote command's
const SSH_ERROR_EXIT: i32 = 255;

/// Result of a successful connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The foreground session ended; carries the remote exit code
    Finished { code: Option<i32> },
    /// A background tunnel is up and bound to this handle
    Detached(TunnelHandle),
}

/// Launches the local process for each connection mode
#[derive(Clone)]
pub struct ConnectionOrchestrator {
    config: Arc<BrokerConfig>,
    keystore: Arc<KeyStore>,
    grants: GrantIssuer,
    relay: Arc<dyn SessionRelay>,
    launcher: Arc<dyn ProcessLauncher>,
    proxy_command: Option<String>,
}

impl ConnectionOrchestrator {
    pub fn new(
        config: Arc<BrokerConfig>,
        keystore: Arc<KeyStore>,
        grants: GrantIssuer,
        relay: Arc<dyn SessionRelay>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        Self {
            config,
            keystore,
            grants,
            relay,
            launcher,
            proxy_command: None,
        }
    }

    /// Command prefix used when `inject_proxy_command` is enabled
    pub fn with_proxy_command(mut self, command: impl Into<String>) -> Self {
        self.proxy_command = Some(command.into());
        self
    }

    /// Validate, grant and connect
    pub async fn connect(
        &self,
        request: &ConnectionRequest,
    ) -> Result<ConnectOutcome, BrokerError> {
        let plan = request.resolve(&self.config.tunnel)?;
        let target = &request.target;

        match plan {
            ConnectPlan::Proxy { port } => self.relay(target, port).await,
            ConnectPlan::Shell => {
                let ssh = self.grant_access(request).await?;
                let spec = ssh.shell(&destination(request));
                self.foreground(ConnectionMode::Shell, target, &spec).await
            }
            ConnectPlan::Tunnel(forward) => {
                let ssh = self.grant_access(request).await?;
                tracing::info!(forward = %forward.as_ssh_arg(), "Opening tunnel");
                let spec = ssh.tunnel(&destination(request), &forward);
                self.foreground(ConnectionMode::Tunnel, target, &spec).await
            }
            ConnectPlan::TunnelSocket(forward) => {
                let ssh = self.grant_access(request).await?;
                let handle = self.config.tunnel_handle(forward.host_port);
                let spec = ssh.tunnel_socket(&destination(request), &forward, &handle);
                let output = self
                    .launch(ConnectionMode::TunnelSocket, target, &spec)
                    .await?;
                if !output.success() {
                    return Err(launch_failed(
                        ConnectionMode::TunnelSocket,
                        target,
                        output.status_text(),
                    ));
                }
                tracing::info!(
                    forward = %forward.as_ssh_arg(),
                    path = %handle.control_path.display(),
                    "Background tunnel ready"
                );
                Ok(ConnectOutcome::Detached(handle))
            }
        }
    }

    /// Relay stdio to `port`; pure transport, the trust store is untouched
    async fn relay(&self, target: &TargetId, port: u16) -> Result<ConnectOutcome, BrokerError> {
        let spec = self.relay.session(target, port);
        let output = self.launch(ConnectionMode::Proxy, target, &spec).await?;
        if output.success() {
            Ok(ConnectOutcome::Finished { code: output.code })
        } else {
            Err(launch_failed(ConnectionMode::Proxy, target, output.status_text()))
        }
    }

    /// Install the grant and return ssh arguments for the broker key
    async fn grant_access(&self, request: &ConnectionRequest) -> Result<SshArgs, BrokerError> {
        let key = self.keystore.load().await?;
        self.grants
            .issue_grant_for_key(
                &request.target,
                &request.remote_user,
                &key,
                self.config.grant_ttl,
            )
            .await?;

        if !self.config.settle_delay.is_zero() {
            tracing::debug!(delay = ?self.config.settle_delay, "Waiting for grant to settle");
            tokio::time::sleep(self.config.settle_delay).await;
        }

        Ok(self.ssh_args(&key))
    }

    fn ssh_args(&self, key: &KeyPair) -> SshArgs {
        let mut ssh = SshArgs::new(&key.private_key_path).with_options(&self.config.ssh_options);
        if self.config.inject_proxy_command {
            if let Some(command) = &self.proxy_command {
                ssh = ssh.with_proxy_command(command);
            }
        }
        ssh
    }

    /// Run an attached session; only ssh's own failure code is an error
    async fn foreground(
        &self,
        mode: ConnectionMode,
        target: &TargetId,
        spec: &LaunchSpec,
    ) -> Result<ConnectOutcome, BrokerError> {
        let output = self.launch(mode, target, spec).await?;
        match output.code {
            Some(SSH_ERROR_EXIT) => Err(launch_failed(mode, target, output.status_text())),
            code => Ok(ConnectOutcome::Finished { code }),
        }
    }

    async fn launch(
        &self,
        mode: ConnectionMode,
        target: &TargetId,
        spec: &LaunchSpec,
    ) -> Result<LaunchOutput, BrokerError> {
        tracing::debug!(mode = %mode, target = %target, command = %spec, "Starting connection");
        self.launcher.run(spec).await.map_err(|e| {
            launch_failed(mode, target, format!("failed to start {}: {}", spec.program, e))
        })
    }
}

fn destination(request: &ConnectionRequest) -> String {
    format!("{}@{}", request.remote_user, request.target)
}

fn launch_failed(mode: ConnectionMode, target: &TargetId, status: String) -> BrokerError {
    BrokerError::ConnectionLaunch {
        mode,
        target: target.clone(),
        status,
    }
}
