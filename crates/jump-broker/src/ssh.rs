//! OpenSSH command lines
//!
//! Every connection mode ends in a local `ssh` invocation. Background tunnels
//! use OpenSSH connection multiplexing: the master binds a control socket and
//! later invocations send it `-O check` / `-O exit`.

use std::path::{Path, PathBuf};

use jump_core::traits::LaunchSpec;
use jump_core::{ForwardSpec, TunnelHandle};

/// Remote command that blocks until the operator ends the session
pub const HOLD_OPEN_COMMAND: &str = "read -r -d '' _";

/// Host argument for control-socket operations; the socket decides the peer
const CONTROL_HOST: &str = "localhost";

/// Control operation on a multiplexed master
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOp {
    Check,
    Exit,
}

impl ControlOp {
    fn as_str(&self) -> &'static str {
        match self {
            ControlOp::Check => "check",
            ControlOp::Exit => "exit",
        }
    }
}

/// Builder for ssh invocations that authenticate with the broker key
#[derive(Debug, Clone)]
pub struct SshArgs {
    program: String,
    identity: PathBuf,
    options: Vec<String>,
}

impl SshArgs {
    pub fn new(identity: &Path) -> Self {
        Self {
            program: "ssh".to_string(),
            identity: identity.to_path_buf(),
            options: Vec::new(),
        }
    }

    /// Add `-o` options (e.g. `StrictHostKeyChecking=accept-new`)
    pub fn with_options(mut self, options: &[String]) -> Self {
        self.options.extend(options.iter().cloned());
        self
    }

    /// Route the connection through `<command> proxy %h %p`
    pub fn with_proxy_command(mut self, command: &str) -> Self {
        self.options.push(format!("ProxyCommand={} proxy %h %p", command));
        self
    }

    fn base(&self) -> Vec<String> {
        let mut args = vec!["-i".to_string(), self.identity.display().to_string()];
        for option in &self.options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        args
    }

    /// Interactive shell
    pub fn shell(&self, destination: &str) -> LaunchSpec {
        let mut args = self.base();
        args.push(destination.to_string());
        LaunchSpec::inherit(&self.program, args)
    }

    /// Foreground forward held open by a blocking remote command
    pub fn tunnel(&self, destination: &str, forward: &ForwardSpec) -> LaunchSpec {
        let mut args = vec!["-t".to_string()];
        args.extend(self.base());
        args.push("-L".to_string());
        args.push(forward.as_ssh_arg());
        args.push(destination.to_string());
        args.push(HOLD_OPEN_COMMAND.to_string());
        LaunchSpec::inherit(&self.program, args)
    }

    /// Detached multiplexed forward bound to `handle`
    ///
    /// `-f` makes ssh fork once authenticated, so the launched process exits
    /// as soon as the tunnel is ready. `ExitOnForwardFailure` turns a busy
    /// host port into a failed launch instead of a tunnel with no forward.
    pub fn tunnel_socket(
        &self,
        destination: &str,
        forward: &ForwardSpec,
        handle: &TunnelHandle,
    ) -> LaunchSpec {
        let mut args = vec![
            "-M".to_string(),
            "-S".to_string(),
            handle.control_path.display().to_string(),
        ];
        args.extend(self.base());
        args.push("-fNT".to_string());
        args.push("-o".to_string());
        args.push("ExitOnForwardFailure=yes".to_string());
        args.push("-L".to_string());
        args.push(forward.as_ssh_arg());
        args.push(destination.to_string());
        // The foreground process must not hold captured pipes open for the
        // backgrounded master, so output stays on the terminal.
        LaunchSpec::inherit(&self.program, args)
    }
}

/// Send a control operation to the master bound to `handle`
pub fn control_command(handle: &TunnelHandle, op: ControlOp) -> LaunchSpec {
    LaunchSpec::capture(
        "ssh",
        vec![
            "-S".to_string(),
            handle.control_path.display().to_string(),
            "-O".to_string(),
            op.as_str().to_string(),
            CONTROL_HOST.to_string(),
        ],
    )
}
