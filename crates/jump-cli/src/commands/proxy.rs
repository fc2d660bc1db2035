//! Proxy command implementation
//!
//! Runs as an ssh `ProxyCommand`: stdout carries the relayed stream, so
//! nothing here prints to it.

use anyhow::Result;

use jump_broker::{BrokerContext, ConnectOutcome};
use jump_core::{ConnectionMode, ConnectionRequest};

use super::exit_status;

/// Relay stdio to `port` on `target`
pub async fn proxy_command(context: &BrokerContext, target: &str, port: u16) -> Result<u8> {
    let request = ConnectionRequest::new(target, ConnectionMode::Proxy, &context.config.ssh_user)
        .with_relay_port(port);

    match context.orchestrator.connect(&request).await? {
        ConnectOutcome::Finished { code } => Ok(exit_status(code)),
        ConnectOutcome::Detached(_) => Ok(0),
    }
}
