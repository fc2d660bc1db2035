//! Background tunnel handles
//!
//! There is no registry file: a tunnel's control path is derived from its
//! host port, so any invocation can reach a tunnel opened by another one.
//! The same derivation makes the host port an exclusive lock, since a second
//! master cannot bind a control path or local port that is already in use.

use std::path::PathBuf;
use std::sync::Arc;

use jump_core::traits::ProcessLauncher;
use jump_core::{BrokerError, TunnelHandle};

use crate::ssh::{control_command, ControlOp};

/// Messages ssh prints when no master is listening on a control path
const NO_MASTER_MARKERS: &[&str] = &[
    "No such file or directory",
    "Connection refused",
    "No ControlPath specified",
];

/// Finds and terminates background tunnels by host port
#[derive(Clone)]
pub struct TunnelRegistry {
    control_dir: PathBuf,
    launcher: Arc<dyn ProcessLauncher>,
}

impl TunnelRegistry {
    pub fn new(control_dir: impl Into<PathBuf>, launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self {
            control_dir: control_dir.into(),
            launcher,
        }
    }

    /// Handle for the tunnel on `host_port`, live or not
    pub fn handle(&self, host_port: u16) -> TunnelHandle {
        TunnelHandle::for_port(&self.control_dir, host_port)
    }

    /// Whether a master is currently bound to the tunnel on `host_port`
    pub async fn check(&self, host_port: u16) -> bool {
        let spec = control_command(&self.handle(host_port), ControlOp::Check);
        match self.launcher.run(&spec).await {
            Ok(output) => output.success(),
            Err(e) => {
                tracing::debug!(host_port, error = %e, "Control check failed to start");
                false
            }
        }
    }

    /// Terminate the tunnel on `host_port`
    ///
    /// Returns `NoActiveTunnel` when nothing is bound to the control path and
    /// `TunnelClose` for any other failure.
    pub async fn close(&self, host_port: u16) -> Result<TunnelHandle, BrokerError> {
        let handle = self.handle(host_port);
        let spec = control_command(&handle, ControlOp::Exit);
        tracing::debug!(command = %spec, "Closing tunnel");

        let output = self
            .launcher
            .run(&spec)
            .await
            .map_err(|e| BrokerError::TunnelClose {
                host_port,
                status: "failed to start ssh".to_string(),
                stderr: e.to_string(),
            })?;

        if output.success() {
            tracing::info!(host_port, path = %handle.control_path.display(), "Tunnel closed");
            return Ok(handle);
        }

        let stderr = output.stderr.trim().to_string();
        if NO_MASTER_MARKERS.iter().any(|m| stderr.contains(m)) {
            return Err(BrokerError::NoActiveTunnel { host_port });
        }

        Err(BrokerError::TunnelClose {
            host_port,
            status: output.status_text(),
            stderr,
        })
    }
}
