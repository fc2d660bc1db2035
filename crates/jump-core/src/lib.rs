//! jump-core: Core abstractions and configuration for jump
//!
//! This crate provides the shared domain types, error taxonomy, collaborator
//! traits and configuration used by the broker and the CLI.

pub mod config;
pub mod error;
pub mod script;
pub mod traits;
pub mod types;

pub use error::{BrokerError, ConfigError};
pub use types::{
    AccessGrant, ConnectPlan, ConnectionMode, ConnectionRequest, ForwardSpec, GrantReceipt,
    Identity, Instance, KeyPair, TargetId, TunnelHandle,
};
