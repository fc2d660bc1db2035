//! Caller identity for audit tagging

use std::sync::Arc;

use jump_core::traits::IdentityProvider;
use jump_core::{BrokerError, Identity};

/// Resolves who is asking for a grant
///
/// The result only tags the trust-store line; it never gates access.
#[derive(Clone)]
pub struct IdentityResolver {
    provider: Arc<dyn IdentityProvider>,
}

impl IdentityResolver {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Query the identity service and extract the display tag
    pub async fn resolve_caller_identity(&self) -> Result<Identity, BrokerError> {
        let principal = self.provider.caller_principal().await?;
        let identity = Identity::from_principal(&principal).ok_or_else(|| {
            BrokerError::IdentityUnavailable(format!("malformed principal '{}'", principal))
        })?;
        tracing::debug!(identity = %identity, "Resolved caller identity");
        Ok(identity)
    }
}
