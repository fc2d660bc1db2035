//! jump CLI
//!
//! Single binary for short-lived access to instances:
//! - Interactive shells and port forwards behind a time-boxed SSH grant
//! - Background tunnels addressed by their host port
//! - A stdio relay for use as an ssh `ProxyCommand`

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jump::commands::{self, ConnectArgs};
use jump::output::{print_error, print_warning};
use jump_broker::BrokerContext;
use jump_core::config;
use jump_core::script::shell_quote;
use jump_core::{BrokerError, ConnectionMode};

#[derive(Parser)]
#[command(name = "jump")]
#[command(author, version, about = "Short-lived SSH access to EC2 instances over SSM")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grant temporary access to an instance and open a shell or tunnel
    Connect {
        /// Instance to connect to (prompts with a list when omitted)
        #[arg(long)]
        target: Option<String>,
        /// Open a port forward instead of a shell
        #[arg(short = 't', long = "type", value_enum)]
        kind: Option<TunnelKind>,
        /// Host the instance forwards to
        #[arg(long)]
        tunnel_domain: Option<String>,
        /// Port on the forwarded host
        #[arg(long)]
        tunnel_port: Option<u16>,
        /// Local port to listen on
        #[arg(long)]
        host_port: Option<u16>,
        /// Remote user (overrides config)
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Close a background tunnel opened with --type tunnel-socket
    CloseSocket {
        /// Local port of the tunnel
        #[arg(long, required = true)]
        host_port: u16,
    },

    /// Relay stdio to a port on an instance (for ssh ProxyCommand)
    Proxy {
        /// Instance to relay to
        target: String,
        /// Remote port
        port: u16,
    },

    /// List running instances
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show effective configuration
    Show,
    /// Show config file path
    Path,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TunnelKind {
    /// Foreground forward, closed with the session
    Tunnel,
    /// Background forward behind a control socket
    TunnelSocket,
}

impl From<TunnelKind> for ConnectionMode {
    fn from(kind: TunnelKind) -> Self {
        match kind {
            TunnelKind::Tunnel => ConnectionMode::Tunnel,
            TunnelKind::TunnelSocket => ConnectionMode::TunnelSocket,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // Help and version
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    // stdout belongs to the relayed stream in proxy mode
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => report(&e),
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Config { action } => {
            match action {
                ConfigAction::Show => commands::config_show(config_path)?,
                ConfigAction::Path => commands::config_path(config_path),
                ConfigAction::Init { force } => commands::config_init(config_path, force)?,
            }
            Ok(0)
        }

        Commands::Connect {
            target,
            kind,
            tunnel_domain,
            tunnel_port,
            host_port,
            user,
        } => {
            let context = build_context(config_path)?;
            let args = ConnectArgs {
                target,
                mode: kind.map(ConnectionMode::from),
                tunnel_domain,
                tunnel_port,
                host_port,
                user,
            };
            commands::connect_command(&context, args).await
        }

        Commands::CloseSocket { host_port } => {
            let context = build_context(config_path)?;
            commands::close_socket_command(&context, host_port).await?;
            Ok(0)
        }

        Commands::Proxy { target, port } => {
            let context = build_context(config_path)?;
            commands::proxy_command(&context, &target, port).await
        }

        Commands::List { json } => {
            let context = build_context(config_path)?;
            commands::list_command(&context, json).await?;
            Ok(0)
        }
    }
}

fn build_context(config_path: Option<&Path>) -> Result<BrokerContext> {
    let config = config::load_broker_config(config_path).map_err(BrokerError::from)?;
    let proxy = config
        .inject_proxy_command
        .then(|| proxy_command_prefix(config_path))
        .flatten();

    let context = BrokerContext::from_config(config);
    Ok(match proxy {
        Some(command) => context.with_proxy_command(command),
        None => context,
    })
}

/// This binary, invoked the way ssh's `ProxyCommand` shell will see it
fn proxy_command_prefix(config_path: Option<&Path>) -> Option<String> {
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            tracing::warn!("Cannot locate own executable, skipping ProxyCommand: {}", e);
            return None;
        }
    };

    let mut command = shell_quote(&exe.display().to_string());
    if let Some(path) = config_path {
        command.push_str(" --config ");
        command.push_str(&shell_quote(&path.display().to_string()));
    }
    Some(command)
}

fn report(error: &anyhow::Error) -> ExitCode {
    match error.downcast_ref::<BrokerError>() {
        Some(e) if e.is_informational() => {
            print_warning(&e.to_string());
            ExitCode::SUCCESS
        }
        Some(e) => {
            print_error(&format!("{}: {}", e.kind(), e));
            ExitCode::FAILURE
        }
        None => {
            print_error(&format!("{:#}", error));
            ExitCode::FAILURE
        }
    }
}
