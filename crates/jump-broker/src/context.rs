//! Per-invocation broker wiring

use std::sync::Arc;

use jump_core::config::BrokerConfig;
use jump_core::traits::{
    IdentityProvider, InstanceDiscovery, ProcessLauncher, RemoteExecutor, SessionRelay,
};

use crate::aws::{AwsCli, Ec2Discovery, SsmExecutor, StsIdentity};
use crate::grant::GrantIssuer;
use crate::identity::IdentityResolver;
use crate::keystore::KeyStore;
use crate::orchestrator::ConnectionOrchestrator;
use crate::process::SystemLauncher;
use crate::registry::TunnelRegistry;

/// External services the broker talks to
#[derive(Clone)]
pub struct Collaborators {
    pub launcher: Arc<dyn ProcessLauncher>,
    pub executor: Arc<dyn RemoteExecutor>,
    pub identity: Arc<dyn IdentityProvider>,
    pub relay: Arc<dyn SessionRelay>,
    pub discovery: Arc<dyn InstanceDiscovery>,
}

impl Collaborators {
    /// Real processes and the `aws` CLI
    pub fn system(config: &BrokerConfig) -> Self {
        let launcher: Arc<dyn ProcessLauncher> = Arc::new(SystemLauncher);
        let cli = AwsCli::new(config.aws.clone(), Arc::clone(&launcher));
        let ssm = Arc::new(SsmExecutor::new(cli.clone()));

        Self {
            launcher,
            executor: ssm.clone(),
            identity: Arc::new(StsIdentity::new(cli.clone())),
            relay: ssm,
            discovery: Arc::new(Ec2Discovery::new(cli)),
        }
    }
}

/// Everything one CLI invocation needs, built once and passed down
#[derive(Clone)]
pub struct BrokerContext {
    pub config: Arc<BrokerConfig>,
    pub keystore: Arc<KeyStore>,
    pub orchestrator: ConnectionOrchestrator,
    pub registry: TunnelRegistry,
    pub discovery: Arc<dyn InstanceDiscovery>,
}

impl BrokerContext {
    /// Context backed by the real system
    pub fn from_config(config: BrokerConfig) -> Self {
        let collaborators = Collaborators::system(&config);
        Self::with_collaborators(config, collaborators)
    }

    /// Context with injected collaborators
    pub fn with_collaborators(config: BrokerConfig, collaborators: Collaborators) -> Self {
        let config = Arc::new(config);
        let keystore = Arc::new(KeyStore::from_config(&config));
        let grants = GrantIssuer::new(
            collaborators.executor,
            IdentityResolver::new(collaborators.identity),
            Arc::clone(&keystore),
        );
        let orchestrator = ConnectionOrchestrator::new(
            Arc::clone(&config),
            Arc::clone(&keystore),
            grants,
            collaborators.relay,
            Arc::clone(&collaborators.launcher),
        );
        let registry = TunnelRegistry::new(config.control_dir.clone(), collaborators.launcher);

        Self {
            config,
            keystore,
            orchestrator,
            registry,
            discovery: collaborators.discovery,
        }
    }

    /// Enable `ProxyCommand` injection with the given command prefix
    pub fn with_proxy_command(mut self, command: impl Into<String>) -> Self {
        self.orchestrator = self.orchestrator.with_proxy_command(command);
        self
    }
}
