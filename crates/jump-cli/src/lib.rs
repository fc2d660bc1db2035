//! jump-cli: Command-line interface for the jump broker
//!
//! Provides the `jump` binary: shells and tunnels to instances through
//! short-lived SSH grants, plus the `proxy` relay used as an ssh
//! `ProxyCommand`.

pub mod commands;
pub mod output;
