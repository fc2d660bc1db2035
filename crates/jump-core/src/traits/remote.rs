//! Remote service traits

use async_trait::async_trait;

use crate::error::BrokerError;
use crate::script::RemoteScript;
use crate::traits::LaunchSpec;
use crate::types::{GrantReceipt, Instance, TargetId};

/// Channel that runs a script on a target as root
///
/// Dispatch is fire-and-forget: it returns once the channel has accepted the
/// command, not when the script finishes.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Submit `script` for execution on `target`
    async fn dispatch(
        &self,
        target: &TargetId,
        script: &RemoteScript,
        comment: &str,
    ) -> Result<GrantReceipt, BrokerError>;
}

/// Source of the caller's principal
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Return the caller's principal ARN
    async fn caller_principal(&self) -> Result<String, BrokerError>;
}

/// Lists running compute instances
#[async_trait]
pub trait InstanceDiscovery: Send + Sync {
    async fn running_instances(&self) -> Result<Vec<Instance>, BrokerError>;
}

/// Platform relay that reaches a target port without a network route
pub trait SessionRelay: Send + Sync {
    /// Command that relays `port` on `target` over the caller's stdio
    fn session(&self, target: &TargetId, port: u16) -> LaunchSpec;
}
