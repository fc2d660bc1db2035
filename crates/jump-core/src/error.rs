//! Core error types for jump

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{ConnectionMode, TargetId};

/// Top-level error type for every broker operation
///
/// All variants are terminal to the current invocation. Nothing is retried
/// internally; the message carries enough context to retry by hand.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// The local key pair could not be created or read
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// The caller identity could not be resolved
    #[error("Identity unavailable: {0}")]
    IdentityUnavailable(String),

    /// The grant script was not accepted by the remote command channel
    #[error("Grant dispatch to {target} failed: {reason}")]
    GrantDispatch { target: TargetId, reason: String },

    /// The connection request is inconsistent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The local connection process failed to start or exited non-zero
    #[error("{mode} connection to {target} failed: {status}")]
    ConnectionLaunch {
        mode: ConnectionMode,
        target: TargetId,
        status: String,
    },

    /// No background tunnel is bound to the control path
    #[error("No active tunnel on host port {host_port}")]
    NoActiveTunnel { host_port: u16 },

    /// The control channel reported a fault while closing a tunnel
    #[error("Failed to close tunnel on host port {host_port}: {status}: {stderr}")]
    TunnelClose {
        host_port: u16,
        status: String,
        stderr: String,
    },

    /// Target discovery failed
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl BrokerError {
    /// Whether this outcome means "nothing to do" rather than a fault
    pub fn is_informational(&self) -> bool {
        matches!(self, BrokerError::NoActiveTunnel { .. })
    }

    /// Short machine-readable name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            BrokerError::KeyGeneration(_) => "KeyGenerationError",
            BrokerError::IdentityUnavailable(_) => "IdentityUnavailableError",
            BrokerError::GrantDispatch { .. } => "GrantDispatchError",
            BrokerError::InvalidRequest(_) => "InvalidRequestError",
            BrokerError::ConnectionLaunch { .. } => "ConnectionLaunchError",
            BrokerError::NoActiveTunnel { .. } => "NoActiveTunnelError",
            BrokerError::TunnelClose { .. } => "TunnelCloseError",
            BrokerError::Discovery(_) => "DiscoveryError",
            BrokerError::Config(_) => "ConfigError",
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_active_tunnel_is_informational() {
        let err = BrokerError::NoActiveTunnel { host_port: 6000 };
        assert!(err.is_informational());
        assert_eq!(err.kind(), "NoActiveTunnelError");
        assert_eq!(err.to_string(), "No active tunnel on host port 6000");
    }

    #[test]
    fn test_launch_error_carries_context() {
        let err = BrokerError::ConnectionLaunch {
            mode: ConnectionMode::TunnelSocket,
            target: TargetId::new("i-0abc"),
            status: "exit status: 255".to_string(),
        };
        assert!(!err.is_informational());
        let msg = err.to_string();
        assert!(msg.contains("tunnel-socket"));
        assert!(msg.contains("i-0abc"));
        assert!(msg.contains("255"));
    }
}
