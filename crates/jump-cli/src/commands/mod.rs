//! CLI command implementations

mod close;
mod config;
mod connect;
mod list;
mod proxy;
mod select;

pub use close::close_socket_command;
pub use config::{config_init, config_path, config_show};
pub use connect::{connect_command, ConnectArgs};
pub use list::list_command;
pub use proxy::proxy_command;
pub use select::{parse_choice, select_target};

/// Map a remote or child exit code onto the process exit status
pub fn exit_status(code: Option<i32>) -> u8 {
    code.and_then(|c| u8::try_from(c).ok()).unwrap_or(1)
}
