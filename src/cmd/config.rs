//! Configuration view and validation commands: `round-monitor config`.

use anyhow::Result;
use std::path::Path;

use super::super::ConfigCommands;

pub fn cmd_config(config_path: &Path, command: Option<ConfigCommands>) -> Result<()> {
    use round_monitor::config::{MonitorConfig, MonitorToml};

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Round Monitor Configuration");
            println!("===========================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                MonitorToml::load(config_path)?
            } else {
                println!("No config file found at {}", config_path.display());
                println!("Using default configuration.");
                MonitorToml::default()
            };
            println!();

            println!("  enabled = {}", toml.enabled);
            println!("  restart_time_buffer = {}", toml.restart_time_buffer);
            println!("  show_forging_order = {}", toml.show_forging_order);
            println!("  show_next_forgers = {}", toml.show_next_forgers);
            println!("  show_round_time = {}", toml.show_round_time);
            println!("  ansi = {}", toml.ansi);
            println!("  status_level = \"{}\"", toml.status_level);
            if !toml.secrets.is_empty() {
                println!("  secrets = {} configured", toml.secrets.len());
            }
            if let Some(path) = &toml.secrets_file {
                println!("  secrets_file = \"{}\"", path.display());
            }
            println!();

            // Effective values (with env overrides)
            let config = MonitorConfig::new(toml);
            println!("Effective values (with env overrides):");
            println!("  delegates = {:?}", config.delegate_names());
            println!(
                "  control server = {}:{}",
                config.server_host(),
                config.server_port()
            );
            println!("  node api = {}", config.api_url());
            println!("  restart plan = {:?}", config.restart_plan());
            println!();

            if !config_path.exists() {
                println!("Run 'round-monitor config init' to create a config file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No config file found. Using defaults (valid).");
                return Ok(());
            }

            let toml = MonitorToml::load(config_path)?;
            let warnings = toml.validate();

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
            if config_path.exists() {
                println!("Config file already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if let Some(parent) = config_path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                std::fs::create_dir_all(parent)?;
            }

            MonitorToml::default().save(config_path)?;

            println!("Created {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - delegate, secrets or secrets_file for the participants to watch");
            println!("  - restart_time_buffer and the [restart] section");
            println!("  - [server] host/port for the control endpoint");
            println!();
        }
    }

    Ok(())
}
