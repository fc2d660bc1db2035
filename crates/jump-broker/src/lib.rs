//! jump-broker: Ephemeral remote-access broker
//!
//! Turns a one-off request for a shell or tunnel into a time-boxed SSH grant
//! on the target plus a local ssh process. The grant removes itself on the
//! target; background tunnels are addressed later by their host port.

pub mod aws;
pub mod context;
pub mod grant;
pub mod identity;
pub mod keystore;
pub mod orchestrator;
pub mod process;
pub mod registry;
pub mod ssh;

pub use context::BrokerContext;
pub use grant::GrantIssuer;
pub use identity::IdentityResolver;
pub use keystore::KeyStore;
pub use orchestrator::{ConnectOutcome, ConnectionOrchestrator};
pub use process::SystemLauncher;
pub use registry::TunnelRegistry;
