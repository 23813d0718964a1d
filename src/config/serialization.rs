//! Config serialization to TOML
//!
//! Single source of truth for config file format.

use super::Config;

/// Escape a path or string for a TOML basic string
fn toml_str(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

impl Config {
    /// Render the config as a commented TOML file
    pub fn to_toml(&self) -> String {
        format!(
            r#"# slack-audit configuration
#
# Environment variables override this file:
#   SLACK_AUDIT_BIND  bind address
#   SLACK_AUDIT_DB    audit database path
#   RUST_LOG          log filter

# HTTP API bind address (keep this on localhost)
bind_addr = "{bind}"

# How many saved-log notifications a slow UI listener may fall behind
notify_buffer = {notify_buffer}

# Audit log database (SQLite)
[storage]
db_path = "{db_path}"

# Page lookups: channel names after posts, message text/author after reactions
[correlation]
enabled = {corr_enabled}
mailbox_size = {corr_mailbox}

# Logging configuration (RUST_LOG env var overrides level)
[logging]
level = "{log_level}"
# JSON file logging in addition to stdout
file_enabled = {log_file_enabled}
file_dir = "{log_file_dir}"
file_rotation = "{log_file_rotation}"  # hourly, daily, never
file_prefix = "{log_file_prefix}"
"#,
            bind = self.bind_addr,
            notify_buffer = self.notify_buffer,
            db_path = toml_str(&self.storage.db_path.display().to_string()),
            corr_enabled = self.correlation.enabled,
            corr_mailbox = self.correlation.mailbox_size,
            log_level = toml_str(&self.logging.level),
            log_file_enabled = self.logging.file_enabled,
            log_file_dir = toml_str(&self.logging.file_dir.display().to_string()),
            log_file_rotation = self.logging.file_rotation.as_str(),
            log_file_prefix = toml_str(&self.logging.file_prefix),
        )
    }
}
