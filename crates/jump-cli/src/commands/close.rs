//! Close-socket command implementation

use anyhow::Result;

use jump_broker::BrokerContext;

use crate::output::print_success;

/// Terminate the background tunnel bound to `host_port`
pub async fn close_socket_command(context: &BrokerContext, host_port: u16) -> Result<()> {
    let handle = context.registry.close(host_port).await?;
    print_success(&format!(
        "Closed tunnel on host port {} ({})",
        handle.host_port,
        handle.control_path.display()
    ));
    Ok(())
}
