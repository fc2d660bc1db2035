//! Output formatting utilities for the CLI
//!
//! Tables for discovered instances and colored status messages. Status
//! messages other than success and info go to stderr, so `proxy` can keep
//! stdout for the relayed byte stream.

use tabled::{settings::Style, Table, Tabled};

use jump_core::Instance;

/// Format instances as a table, numbered when used as a selection menu
pub fn format_instances(instances: &[Instance], numbered: bool) -> String {
    if instances.is_empty() {
        return "No running instances".to_string();
    }

    #[derive(Tabled)]
    struct InstanceRow {
        #[tabled(rename = "INSTANCE ID")]
        id: String,
        #[tabled(rename = "NAME")]
        name: String,
    }

    #[derive(Tabled)]
    struct NumberedRow {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "INSTANCE ID")]
        id: String,
        #[tabled(rename = "NAME")]
        name: String,
    }

    if numbered {
        let rows: Vec<NumberedRow> = instances
            .iter()
            .enumerate()
            .map(|(i, instance)| NumberedRow {
                index: i + 1,
                id: instance.id.to_string(),
                name: instance.display_name().to_string(),
            })
            .collect();
        Table::new(rows).with(Style::rounded()).to_string()
    } else {
        let rows: Vec<InstanceRow> = instances
            .iter()
            .map(|instance| InstanceRow {
                id: instance.id.to_string(),
                name: instance.display_name().to_string(),
            })
            .collect();
        Table::new(rows).with(Style::rounded()).to_string()
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow to stderr
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
