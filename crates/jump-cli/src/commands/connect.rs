//! Connect command implementation

use anyhow::Result;

use jump_broker::{BrokerContext, ConnectOutcome};
use jump_core::{ConnectionMode, ConnectionRequest, TargetId};

use super::{exit_status, select_target};
use crate::output::{print_error, print_info, print_success};

/// Options of `jump connect`
#[derive(Debug, Clone, Default)]
pub struct ConnectArgs {
    pub target: Option<String>,
    /// `None` for an interactive shell
    pub mode: Option<ConnectionMode>,
    pub tunnel_domain: Option<String>,
    pub tunnel_port: Option<u16>,
    pub host_port: Option<u16>,
    pub user: Option<String>,
}

impl ConnectArgs {
    fn into_request(self, target: TargetId, default_user: &str) -> ConnectionRequest {
        let mode = self.mode.unwrap_or(ConnectionMode::Shell);
        let user = self.user.unwrap_or_else(|| default_user.to_string());

        let mut request = ConnectionRequest::new(target, mode, user);
        request.tunnel_domain = self.tunnel_domain;
        request.tunnel_port = self.tunnel_port;
        request.host_port = self.host_port;
        request
    }
}

/// Execute the connect command, returning the process exit status
pub async fn connect_command(context: &BrokerContext, args: ConnectArgs) -> Result<u8> {
    let target = match &args.target {
        Some(target) => TargetId::new(target.as_str()),
        None => match select_target(context.discovery.as_ref()).await? {
            Some(target) => target,
            None => {
                print_error("No target selected");
                return Ok(1);
            }
        },
    };

    let request = args.into_request(target, &context.config.ssh_user);
    if request.mode != ConnectionMode::Shell {
        print_info(&format!(
            "Granting {} access to {} for {}s",
            request.mode,
            request.target,
            context.config.grant_ttl.as_secs()
        ));
    }

    match context.orchestrator.connect(&request).await? {
        ConnectOutcome::Finished { code } => Ok(exit_status(code)),
        ConnectOutcome::Detached(handle) => {
            print_success(&format!(
                "Tunnel to {} listening on localhost:{}",
                request.target, handle.host_port
            ));
            print_info(&format!(
                "Close it with: jump close-socket --host-port {}",
                handle.host_port
            ));
            Ok(0)
        }
    }
}
