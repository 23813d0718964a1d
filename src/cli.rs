// CLI module - command-line argument parsing and handlers
//
// Without a subcommand the binary runs the daemon. Subcommands:
// - logs [--json]: print every stored record, oldest first
// - config --show: Display effective configuration
// - config --reset: Regenerate config file with defaults
// - config --path: Show config file path

use crate::config::{Config, VERSION};
use crate::events::{Activity, StoredRecord};
use crate::storage::LogStore;
use crate::util::text_preview;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;

/// slack-audit - local audit log of Slack posts and reactions
#[derive(Parser)]
#[command(name = "slack-audit")]
#[command(version = VERSION)]
#[command(about = "Local audit log of Slack posts and reactions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print stored audit records
    Logs {
        /// Emit the same JSON the UI receives
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Reset config file to defaults
        #[arg(long)]
        reset: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

/// Handle CLI commands. Returns true if a command was handled (exit after).
pub async fn handle_cli(cli: &Cli) -> Result<bool> {
    match &cli.command {
        Some(Commands::Logs { json }) => {
            handle_logs(*json).await?;
            Ok(true)
        }
        Some(Commands::Config { show, reset, path }) => {
            if *path {
                handle_config_path()?;
            } else if *show {
                handle_config_show()?;
            } else if *reset {
                handle_config_reset()?;
            } else {
                println!("Usage: slack-audit config [--show|--reset|--path]");
                println!();
                println!("Options:");
                println!("  --show    Display effective configuration");
                println!("  --reset   Reset config file to defaults");
                println!("  --path    Show config file path");
            }
            Ok(true)
        }
        None => Ok(false),
    }
}

async fn handle_logs(json: bool) -> Result<()> {
    let config = Config::from_env()?;
    let store = LogStore::open(&config.storage.db_path, config.notify_buffer)
        .with_context(|| format!("Failed to open {:?}", config.storage.db_path))?;
    let records = store.list_all().await.context("Failed to read audit log")?;

    if json {
        let body = serde_json::json!({ "logs": records });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No records in {}", config.storage.db_path.display());
        return Ok(());
    }

    for record in &records {
        println!("{}", format_record(record));
    }
    Ok(())
}

/// One line per record: id, time, channel, what happened
pub fn format_record(stored: &StoredRecord) -> String {
    let record = &stored.record;
    let when = record
        .logged_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let channel = record.channel_name().unwrap_or(record.channel_id());

    let what = match &record.activity {
        Activity::Post { text, .. } => format!("post \"{}\"", text_preview(text, 80)),
        Activity::Reaction {
            emoji,
            reaction_type,
            text,
            user,
            ..
        } => {
            let mut line = format!("reaction {} :{}:", reaction_type.as_str(), emoji);
            if let Some(user) = user {
                line.push_str(&format!(" on {}", user));
            }
            if let Some(text) = text {
                line.push_str(&format!(" \"{}\"", text_preview(text, 60)));
            }
            line
        }
    };

    format!("{:>5}  {}  #{:<20} {}", stored.id, when, channel, what)
}

fn handle_config_path() -> Result<()> {
    let path = Config::config_path().context("Could not determine config path")?;
    println!("{}", path.display());
    Ok(())
}

fn handle_config_show() -> Result<()> {
    let config = Config::from_env()?;

    println!("# Effective configuration (env > file > defaults)");
    println!();
    print!("{}", config.to_toml());

    println!();
    if let Some(path) = Config::config_path() {
        if path.exists() {
            println!("# Source: {}", path.display());
        } else {
            println!("# Source: defaults (no config file)");
        }
    }
    Ok(())
}

fn handle_config_reset() -> Result<()> {
    let path = Config::config_path().context("Could not determine config path")?;

    if path.exists() {
        eprint!(
            "Config file exists at {}. Overwrite? [y/N] ",
            path.display()
        );
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Error creating directory {}", parent.display()))?;
    }

    std::fs::write(&path, Config::default().to_toml())
        .with_context(|| format!("Error writing config {}", path.display()))?;

    println!("Config reset to defaults: {}", path.display());
    Ok(())
}
