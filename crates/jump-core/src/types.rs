//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::config::TunnelDefaults;
use crate::error::BrokerError;

/// Identifier of a remote compute instance (e.g. `i-0abc123`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId(pub String);

impl TargetId {
    /// Create a new target ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TargetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TargetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A running instance as reported by discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Instance identifier
    pub id: TargetId,
    /// Value of the `Name` tag, if any
    pub name: Option<String>,
}

impl Instance {
    /// Name for menus, `N/A` when the instance is untagged
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("N/A")
    }
}

/// Local SSH key material used for every grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    /// Path to the private key (passed to `ssh -i`)
    pub private_key_path: PathBuf,
    /// Path to the public key file
    pub public_key_path: PathBuf,
    /// Trimmed public key line (`ssh-rsa AAAA... comment`)
    pub public_key: String,
}

impl KeyPair {
    /// The textual public key
    pub fn public_key_material(&self) -> &str {
        &self.public_key
    }
}

/// A self-expiring authorization appended to a remote trust store
///
/// Once dispatched the broker has no further view of it. The remote script
/// removes the line after `ttl` whether or not a connection was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub target: TargetId,
    pub remote_user: String,
    pub public_key: String,
    pub identity_tag: String,
    pub ttl: Duration,
}

impl AccessGrant {
    /// The line written to the trust store
    pub fn trust_line(&self) -> String {
        format!("{} {}", self.public_key, self.identity_tag)
    }
}

/// Acknowledgement from the remote command channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantReceipt {
    /// Channel-assigned command identifier
    pub command_id: String,
}

/// Audit tag for the operator requesting a grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub display_name: String,
}

impl Identity {
    /// Derive an identity from a principal ARN
    ///
    /// The tag is the trailing path segment (`arn:aws:sts::1:assumed-role/R/alice`
    /// gives `alice`). Principals without a path use the last `:` field.
    pub fn from_principal(arn: &str) -> Option<Self> {
        let arn = arn.trim();
        if !arn.starts_with("arn:") {
            return None;
        }
        let tail = match arn.rsplit_once('/') {
            Some((_, tail)) => tail,
            None => arn.rsplit(':').next().unwrap_or_default(),
        };
        if tail.is_empty() || tail.chars().any(char::is_whitespace) {
            return None;
        }
        Some(Self {
            display_name: tail.to_string(),
        })
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name)
    }
}

/// How the operator wants to reach the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionMode {
    /// Interactive terminal session
    Shell,
    /// Foreground port forward held open until the operator quits
    Tunnel,
    /// Detached, multiplexed port forward addressable by control socket
    TunnelSocket,
    /// Raw relay for use as an SSH `ProxyCommand`
    Proxy,
}

impl ConnectionMode {
    /// Whether this mode needs a grant before connecting
    pub fn requires_grant(&self) -> bool {
        !matches!(self, ConnectionMode::Proxy)
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionMode::Shell => write!(f, "shell"),
            ConnectionMode::Tunnel => write!(f, "tunnel"),
            ConnectionMode::TunnelSocket => write!(f, "tunnel-socket"),
            ConnectionMode::Proxy => write!(f, "proxy"),
        }
    }
}

impl FromStr for ConnectionMode {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shell" => Ok(ConnectionMode::Shell),
            "tunnel" => Ok(ConnectionMode::Tunnel),
            "tunnel-socket" => Ok(ConnectionMode::TunnelSocket),
            "proxy" => Ok(ConnectionMode::Proxy),
            other => Err(BrokerError::InvalidRequest(format!(
                "unknown connection mode '{}'",
                other
            ))),
        }
    }
}

/// A local port forward: `host_port` locally to `tunnel_domain:tunnel_port` remotely
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardSpec {
    pub host_port: u16,
    pub tunnel_domain: String,
    pub tunnel_port: u16,
}

impl ForwardSpec {
    /// Argument for `ssh -L`
    pub fn as_ssh_arg(&self) -> String {
        format!(
            "{}:{}:{}",
            self.host_port, self.tunnel_domain, self.tunnel_port
        )
    }
}

/// An operator request for a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub target: TargetId,
    pub mode: ConnectionMode,
    pub remote_user: String,
    pub tunnel_domain: Option<String>,
    pub tunnel_port: Option<u16>,
    pub host_port: Option<u16>,
    /// Remote port for `proxy` mode
    pub relay_port: Option<u16>,
}

impl ConnectionRequest {
    /// A request with no mode-specific fields set
    pub fn new(
        target: impl Into<TargetId>,
        mode: ConnectionMode,
        remote_user: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            mode,
            remote_user: remote_user.into(),
            tunnel_domain: None,
            tunnel_port: None,
            host_port: None,
            relay_port: None,
        }
    }

    /// Set the local side of the forward
    pub fn with_host_port(mut self, port: u16) -> Self {
        self.host_port = Some(port);
        self
    }

    /// Set the remote side of the forward
    pub fn with_tunnel(mut self, domain: impl Into<String>, port: u16) -> Self {
        self.tunnel_domain = Some(domain.into());
        self.tunnel_port = Some(port);
        self
    }

    /// Set the relay port for `proxy` mode
    pub fn with_relay_port(mut self, port: u16) -> Self {
        self.relay_port = Some(port);
        self
    }

    fn has_forward_fields(&self) -> bool {
        self.tunnel_domain.is_some() || self.tunnel_port.is_some() || self.host_port.is_some()
    }

    /// Check the request and fill in forward defaults
    ///
    /// Runs before anything touches the network, so a bad combination never
    /// produces a grant.
    pub fn resolve(&self, defaults: &TunnelDefaults) -> Result<ConnectPlan, BrokerError> {
        validate_target(&self.target)?;

        match self.mode {
            ConnectionMode::Proxy => {
                if self.has_forward_fields() {
                    return Err(BrokerError::InvalidRequest(
                        "proxy mode does not take tunnel options".to_string(),
                    ));
                }
                let port = self.relay_port.ok_or_else(|| {
                    BrokerError::InvalidRequest("proxy mode requires a port".to_string())
                })?;
                check_port("port", port)?;
                Ok(ConnectPlan::Proxy { port })
            }
            ConnectionMode::Shell => {
                self.check_ssh_fields()?;
                if self.has_forward_fields() {
                    return Err(BrokerError::InvalidRequest(
                        "tunnel options require --type tunnel or tunnel-socket".to_string(),
                    ));
                }
                Ok(ConnectPlan::Shell)
            }
            ConnectionMode::Tunnel => {
                self.check_ssh_fields()?;
                Ok(ConnectPlan::Tunnel(self.forward(defaults)?))
            }
            ConnectionMode::TunnelSocket => {
                self.check_ssh_fields()?;
                Ok(ConnectPlan::TunnelSocket(self.forward(defaults)?))
            }
        }
    }

    fn check_ssh_fields(&self) -> Result<(), BrokerError> {
        validate_remote_user(&self.remote_user)?;
        if self.relay_port.is_some() {
            return Err(BrokerError::InvalidRequest(format!(
                "{} mode does not take a relay port",
                self.mode
            )));
        }
        Ok(())
    }

    fn forward(&self, defaults: &TunnelDefaults) -> Result<ForwardSpec, BrokerError> {
        let forward = ForwardSpec {
            host_port: self.host_port.unwrap_or(defaults.host_port),
            tunnel_domain: self
                .tunnel_domain
                .clone()
                .unwrap_or_else(|| defaults.domain.clone()),
            tunnel_port: self.tunnel_port.unwrap_or(defaults.port),
        };
        check_port("host port", forward.host_port)?;
        check_port("tunnel port", forward.tunnel_port)?;
        if forward.tunnel_domain.is_empty()
            || forward.tunnel_domain.chars().any(|c| c.is_whitespace() || c == ':')
        {
            return Err(BrokerError::InvalidRequest(format!(
                "invalid tunnel domain '{}'",
                forward.tunnel_domain
            )));
        }
        Ok(forward)
    }
}

/// A validated request, ready to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectPlan {
    Shell,
    Tunnel(ForwardSpec),
    TunnelSocket(ForwardSpec),
    Proxy { port: u16 },
}

impl ConnectPlan {
    pub fn mode(&self) -> ConnectionMode {
        match self {
            ConnectPlan::Shell => ConnectionMode::Shell,
            ConnectPlan::Tunnel(_) => ConnectionMode::Tunnel,
            ConnectPlan::TunnelSocket(_) => ConnectionMode::TunnelSocket,
            ConnectPlan::Proxy { .. } => ConnectionMode::Proxy,
        }
    }
}

fn check_port(what: &str, port: u16) -> Result<(), BrokerError> {
    if port == 0 {
        return Err(BrokerError::InvalidRequest(format!("{} must be non-zero", what)));
    }
    Ok(())
}

fn validate_target(target: &TargetId) -> Result<(), BrokerError> {
    let id = target.as_str();
    if id.is_empty() || id.starts_with('-') || id.chars().any(|c| c.is_whitespace()) {
        return Err(BrokerError::InvalidRequest(format!(
            "invalid target id '{}'",
            id
        )));
    }
    Ok(())
}

/// Remote user names are interpolated unquoted for `~user` expansion
fn validate_remote_user(user: &str) -> Result<(), BrokerError> {
    let valid = !user.is_empty()
        && !user.starts_with('-')
        && user
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !valid {
        return Err(BrokerError::InvalidRequest(format!(
            "invalid remote user '{}'",
            user
        )));
    }
    Ok(())
}

/// Control handle of a background tunnel
///
/// The control path is a pure function of the host port, so any later
/// invocation can find the tunnel again without local bookkeeping. This also
/// means at most one background tunnel can exist per host port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelHandle {
    pub host_port: u16,
    pub control_path: PathBuf,
}

impl TunnelHandle {
    /// Derive the handle for `host_port` under `control_dir`
    pub fn for_port(control_dir: &Path, host_port: u16) -> Self {
        Self {
            host_port,
            control_path: control_dir.join(format!("{}-control-socket", host_port)),
        }
    }
}
