//! Config command handlers

use std::path::Path;

use anyhow::{bail, Context, Result};
use notebook_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config: &Config, config_path: &Path, output: &Output) -> Result<()> {
    match output.format {
        OutputFormat::Json => {
            output.json(&serde_json::json!({
                "data_dir": config.data_dir,
                "api_endpoint": config.api_endpoint,
                "timeout_secs": config.timeout_secs,
            }));
        }
        OutputFormat::Quiet => {
            println!("{}", config.api_endpoint);
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:     {}", config.data_dir.display());
            println!("  api_endpoint: {}", config.api_endpoint);
            println!("  timeout_secs: {}", config.timeout_secs);
            println!();
            println!("Config file: {}", config_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value and save the file
pub fn set(
    mut config: Config,
    key: &str,
    value: &str,
    config_path: &Path,
    output: &Output,
) -> Result<()> {
    apply(&mut config, key, value)?;
    config
        .save_to_path(config_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));
    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "api_endpoint" => {
            if value.is_empty() {
                bail!("api_endpoint must not be empty");
            }
            config.api_endpoint = value.trim_end_matches('/').to_string();
        }
        "timeout_secs" => {
            config.timeout_secs = value
                .parse()
                .context("Invalid value for timeout_secs. Use a whole number of seconds.")?;
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, api_endpoint, timeout_secs",
                key
            );
        }
    }
    Ok(())
}
