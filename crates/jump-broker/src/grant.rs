//! Self-expiring access grants
//!
//! A grant appends the broker public key to the target user's
//! `authorized_keys`, sleeps for the TTL and removes it again. The whole
//! lifecycle runs on the target, so the grant expires even if this process
//! exits right after dispatch.

use std::sync::Arc;
use std::time::Duration;

use jump_core::config::MAX_GRANT_TTL;
use jump_core::script::RemoteScript;
use jump_core::traits::RemoteExecutor;
use jump_core::{AccessGrant, BrokerError, GrantReceipt, KeyPair, TargetId};

use crate::identity::IdentityResolver;
use crate::keystore::KeyStore;

/// Builds grant scripts and dispatches them to targets
#[derive(Clone)]
pub struct GrantIssuer {
    executor: Arc<dyn RemoteExecutor>,
    identity: IdentityResolver,
    keystore: Arc<KeyStore>,
}

impl GrantIssuer {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        identity: IdentityResolver,
        keystore: Arc<KeyStore>,
    ) -> Self {
        Self {
            executor,
            identity,
            keystore,
        }
    }

    /// Dispatch a grant for `remote_user` on `target` lasting `ttl`
    ///
    /// Returns once the command channel accepts the script. The key may not
    /// be installed yet when this returns.
    pub async fn issue_grant(
        &self,
        target: &TargetId,
        remote_user: &str,
        ttl: Duration,
    ) -> Result<GrantReceipt, BrokerError> {
        check_ttl(ttl)?;
        let key = self.keystore.load().await?;
        self.issue_grant_for_key(target, remote_user, &key, ttl).await
    }

    /// Like [`issue_grant`](Self::issue_grant) for a key the caller already holds
    pub async fn issue_grant_for_key(
        &self,
        target: &TargetId,
        remote_user: &str,
        key: &KeyPair,
        ttl: Duration,
    ) -> Result<GrantReceipt, BrokerError> {
        check_ttl(ttl)?;
        let identity = self.identity.resolve_caller_identity().await?;

        let grant = AccessGrant {
            target: target.clone(),
            remote_user: remote_user.to_string(),
            public_key: key.public_key.clone(),
            identity_tag: identity.display_name.clone(),
            ttl,
        };
        let script = RemoteScript::for_grant(&grant);
        let comment = format!(
            "{} - grant ssh access for {} seconds",
            identity,
            ttl.as_secs()
        );

        let receipt = self.executor.dispatch(target, &script, &comment).await?;

        tracing::info!(
            target = %target,
            user = %remote_user,
            ttl_secs = ttl.as_secs(),
            command_id = %receipt.command_id,
            "Grant dispatched"
        );

        Ok(receipt)
    }
}

fn check_ttl(ttl: Duration) -> Result<(), BrokerError> {
    if ttl.as_secs() == 0 {
        return Err(BrokerError::InvalidRequest(
            "grant ttl must be at least one second".to_string(),
        ));
    }
    if ttl > MAX_GRANT_TTL {
        return Err(BrokerError::InvalidRequest(format!(
            "grant ttl must be at most {} seconds",
            MAX_GRANT_TTL.as_secs()
        )));
    }
    Ok(())
}
