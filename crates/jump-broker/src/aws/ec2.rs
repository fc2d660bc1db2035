//! EC2 instance discovery

use async_trait::async_trait;
use serde::Deserialize;

use jump_core::traits::InstanceDiscovery;
use jump_core::{BrokerError, Instance, TargetId};

use super::AwsCli;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstances {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<Ec2Instance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Ec2Instance {
    instance_id: String,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Tag {
    key: String,
    value: String,
}

impl From<Ec2Instance> for Instance {
    fn from(raw: Ec2Instance) -> Self {
        let name = raw
            .tags
            .into_iter()
            .find(|tag| tag.key == "Name")
            .map(|tag| tag.value);
        Instance {
            id: TargetId::new(raw.instance_id),
            name,
        }
    }
}

/// Lists running instances with `ec2 describe-instances`
#[derive(Clone)]
pub struct Ec2Discovery {
    cli: AwsCli,
}

impl Ec2Discovery {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl InstanceDiscovery for Ec2Discovery {
    async fn running_instances(&self) -> Result<Vec<Instance>, BrokerError> {
        let response: DescribeInstances = self
            .cli
            .run_json([
                "ec2",
                "describe-instances",
                "--filters",
                "Name=instance-state-name,Values=running",
            ])
            .await
            .map_err(|e| BrokerError::Discovery(e.to_string()))?;

        Ok(response
            .reservations
            .into_iter()
            .flat_map(|r| r.instances)
            .map(Instance::from)
            .collect())
    }
}
