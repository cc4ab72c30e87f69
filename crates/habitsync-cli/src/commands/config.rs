//! Config command handlers

use anyhow::{bail, Context, Result};

use habitsync_core::Config;

use crate::output::{Output, OutputFormat};

/// Keys accepted by `config set`
const KEYS: &str = "data_dir, account_id, remote_dir, sync_enabled, snapshot_interval_hours, log_file";

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "account_id": config.account_id,
                    "remote_dir": config.remote_dir,
                    "sync_enabled": config.sync_enabled,
                    "snapshot_interval_hours": config.snapshot_interval_hours,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:                {}", config.data_dir.display());
            println!(
                "  account_id:              {}",
                config.account_id.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  remote_dir:              {}",
                display_path(config.remote_dir.as_deref())
            );
            println!("  sync_enabled:            {}", config.sync_enabled);
            println!(
                "  snapshot_interval_hours: {}",
                config.snapshot_interval_hours
            );
            println!(
                "  log_file:                {}",
                display_path(config.log_file.as_deref())
            );
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    apply(&mut config, &key, &value)?;
    config.save().context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));
    Ok(())
}

/// Assign one key; an empty value or "none" clears optional keys
fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let cleared = value.is_empty() || value == "none";

    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "account_id" => {
            config.account_id = (!cleared).then(|| value.to_string());
        }
        "remote_dir" => {
            config.remote_dir = (!cleared).then(|| value.into());
        }
        "sync_enabled" => {
            config.sync_enabled = value
                .parse()
                .context("Invalid value for sync_enabled. Use 'true' or 'false'.")?;
        }
        "snapshot_interval_hours" => {
            config.snapshot_interval_hours = value
                .parse()
                .context("Invalid value for snapshot_interval_hours. Use a whole number.")?;
        }
        "log_file" => {
            config.log_file = (!cleared).then(|| value.into());
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                KEYS
            );
        }
    }
    Ok(())
}

fn display_path(path: Option<&std::path::Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not set)".to_string())
}
