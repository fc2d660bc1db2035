//! Collaborator trait definitions

mod process;
mod remote;

pub use process::{LaunchOutput, LaunchSpec, ProcessLauncher, StdioMode};
pub use remote::{IdentityProvider, InstanceDiscovery, RemoteExecutor, SessionRelay};
