//! List command implementation

use anyhow::{Context, Result};

use jump_broker::BrokerContext;

use crate::output::format_instances;

/// Print running instances as a table, or as JSON with `json`
pub async fn list_command(context: &BrokerContext, json: bool) -> Result<()> {
    let instances = context.discovery.running_instances().await?;

    if json {
        let out = serde_json::to_string_pretty(&instances)
            .context("Failed to serialize instances")?;
        println!("{}", out);
    } else {
        println!("{}", format_instances(&instances, false));
    }

    Ok(())
}
