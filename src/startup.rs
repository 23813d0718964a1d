// Startup module - displays banner and module status
//
// Printed to stdout before the server starts so the operator sees where
// records go and which optional pieces are active.

use crate::config::{Config, VERSION};

/// ANSI color codes for terminal output
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GREEN: &str = "\x1b[32m";
    pub const MAGENTA: &str = "\x1b[35m";
}

/// Module loading result for display
pub struct ModuleStatus {
    pub name: &'static str,
    pub enabled: bool,
    pub description: &'static str,
}

/// Print the startup banner and module status
pub fn print_startup(config: &Config) {
    use colors::*;

    println!();
    println!("  {BOLD}{CYAN}slack-audit{RESET} {DIM}v{VERSION}{RESET}");
    println!("  {DIM}Local audit log of Slack posts and reactions{RESET}");
    println!();

    if let Some(path) = Config::config_path() {
        if path.exists() {
            println!("  {DIM}Config:{RESET} {GREEN}✓{RESET} {}", path.display());
        } else {
            println!("  {DIM}Config:{RESET} {DIM}(using defaults){RESET}");
        }
    }
    println!(
        "  {DIM}Database:{RESET} {}",
        config.storage.db_path.display()
    );
    println!();

    for module in &module_status(config) {
        print_module_status(module);
    }

    println!();
    println!(
        "  {MAGENTA}▸{RESET} Listening on {BOLD}http://{}{RESET}",
        config.bind_addr
    );
    println!();
}

/// Status of all modules based on config
pub fn module_status(config: &Config) -> Vec<ModuleStatus> {
    vec![
        ModuleStatus {
            name: "classifier",
            enabled: true,
            description: "Slack write endpoints",
        },
        ModuleStatus {
            name: "correlation",
            enabled: config.correlation.enabled,
            description: "Channel names and reaction targets from the page",
        },
        ModuleStatus {
            name: "storage",
            enabled: true,
            description: "SQLite audit log",
        },
        ModuleStatus {
            name: "file-logs",
            enabled: config.logging.file_enabled,
            description: "JSON trace files",
        },
    ]
}

fn print_module_status(module: &ModuleStatus) {
    use colors::*;

    let (icon, style) = if module.enabled {
        (format!("{GREEN}✓{RESET}"), "")
    } else {
        (format!("{DIM}○{RESET}"), DIM)
    };

    println!(
        "    {icon} {style}{:<12}{RESET} {DIM}{}{RESET}",
        module.name, module.description
    );
}
