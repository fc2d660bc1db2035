//! Interactive target selection

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use jump_core::traits::InstanceDiscovery;
use jump_core::{Instance, TargetId};

use crate::output::{format_instances, print_warning};

/// Show running instances and read a choice from stdin
///
/// Returns `None` when nothing is running or the operator gives no valid
/// choice.
pub async fn select_target(discovery: &dyn InstanceDiscovery) -> Result<Option<TargetId>> {
    let instances = discovery.running_instances().await?;
    if instances.is_empty() {
        print_warning("No running instances found");
        return Ok(None);
    }

    println!("{}", format_instances(&instances, true));
    print!("Select an instance [1-{}]: ", instances.len());
    std::io::stdout().flush().context("Failed to write prompt")?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read selection")?;

    let choice = parse_choice(&line, &instances);
    if choice.is_none() && !line.trim().is_empty() {
        print_warning(&format!("Invalid selection: {}", line.trim()));
    }
    Ok(choice)
}

/// Resolve a menu answer: a 1-based index or an instance id
pub fn parse_choice(input: &str, instances: &[Instance]) -> Option<TargetId> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(index) = input.parse::<usize>() {
        return index
            .checked_sub(1)
            .and_then(|i| instances.get(i))
            .map(|instance| instance.id.clone());
    }

    instances
        .iter()
        .find(|instance| instance.id.as_str() == input)
        .map(|instance| instance.id.clone())
}
