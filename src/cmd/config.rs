//! Configuration view and validation commands: `devagent config`.

use anyhow::Result;

use devagent::config::{CliOverrides, DashboardConfig, config_path};

use super::super::ConfigCommands;

fn print_values(config: &DashboardConfig) {
    println!("  api_url = \"{}\"", config.api_url);
    println!("  request_timeout_secs = {}", config.request_timeout_secs);
    println!("  poll_interval_ms = {}", config.poll_interval_ms);
    println!("  reconcile_delay_ms = {}", config.reconcile_delay_ms);
    println!("  optimistic_placeholders = {}", config.optimistic_placeholders);
    println!("  placeholder_ttl_ms = {}", config.placeholder_ttl_ms);
    println!("  agent_reply_delay_ms = {}", config.agent_reply_delay_ms);
    println!("  recent_jobs_limit = {}", config.recent_jobs_limit);
    println!("  log_dir = \"{}\"", config.log_dir.display());
    println!("  serve_port = {}", config.serve_port);
}

pub fn cmd_config(
    project_dir: &std::path::Path,
    cli: &CliOverrides,
    command: Option<ConfigCommands>,
) -> Result<()> {
    let path = config_path(project_dir);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("DevAgent Configuration");
            println!("======================");
            println!();

            if path.exists() {
                println!("Config file: {}", path.display());
                println!();
                print_values(&DashboardConfig::load(&path)?);
            } else {
                println!("No devagent.toml found at {}", path.display());
                println!();
                println!("Using default configuration:");
                print_values(&DashboardConfig::default());
                println!();
                println!("Run 'devagent config init' to create a devagent.toml file.");
            }
            println!();

            println!("Effective values (with env/CLI overrides):");
            print_values(&DashboardConfig::resolve(project_dir, cli)?);
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !path.exists() {
                println!("No devagent.toml found. Using defaults (valid).");
                return Ok(());
            }

            let config = DashboardConfig::load(&path)?;
            let warnings = config.validate();
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
                println!("devagent.toml already exists at {}", path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            DashboardConfig::default().save(&path)?;

            println!("Created devagent.toml at {}", path.display());
            println!();
            println!("You can now customize:");
            println!("  - api_url, request_timeout_secs for the agent backend");
            println!("  - poll_interval_ms, reconcile_delay_ms for refresh timing");
            println!("  - optimistic_placeholders to show pending jobs right after a trigger");
            println!();
        }
    }

    Ok(())
}
