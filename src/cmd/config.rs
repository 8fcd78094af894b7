//! Configuration view and validation commands: `taskboard config`.

use std::path::Path;

use anyhow::{Context, Result};
use taskboard::config::{ClientConfig, TaskboardToml};

use super::super::ConfigCommands;

pub fn cmd_config(
    config_path: Option<&Path>,
    effective: &ClientConfig,
    command: Option<ConfigCommands>,
) -> Result<()> {
    let path = match config_path {
        Some(p) => p.to_path_buf(),
        None => ClientConfig::default_path().context("Could not determine config directory")?,
    };

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Taskboard Configuration");
            println!("=======================");
            println!();

            if path.exists() {
                println!("Config file: {}", path.display());
            } else {
                println!("No taskboard.toml found at {}", path.display());
                println!("Run 'taskboard config init' to create one.");
            }
            println!();

            println!("Effective values (with env/CLI overrides):");
            println!("  api_url = \"{}\"", effective.api_url);
            match effective.stream_url() {
                Ok(url) => println!("  ws_url = \"{}\"", url),
                Err(e) => println!("  ws_url = <invalid: {}>", e),
            }
            println!(
                "  token = {}",
                if effective.credential.is_some() { "<set>" } else { "<unset>" }
            );
            println!("  request_timeout_secs = {}", effective.request_timeout.as_secs());
            println!("  reconnect.max_attempts = {}", effective.reconnect.max_attempts);
            println!("  reconnect.initial_delay_ms = {}", effective.reconnect.initial_delay_ms);
            println!("  reconnect.max_delay_ms = {}", effective.reconnect.max_delay_ms);
            println!("  logging.format = \"{}\"", effective.log_format);
            println!("  logging.level = \"{}\"", effective.log_level);
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let warnings = effective.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if path.exists() {
                println!("taskboard.toml already exists at {}", path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            TaskboardToml::default().save(&path)?;

            println!("Created taskboard.toml at {}", path.display());
            println!();
            println!("You can now customize:");
            println!("  - [server] api_url, ws_url, request_timeout_secs");
            println!("  - [reconnect] max_attempts, initial_delay_ms, max_delay_ms");
            println!("  - [logging] format, level");
            println!();
        }
    }

    Ok(())
}
