use anyhow::{Context, Result};
use std::path::PathBuf;

/// Centralized path management for modshim
/// This module provides a single source of truth for all application paths

/// Environment variable that overrides the config file location
pub const CONFIG_ENV: &str = "MODSHIM_CONFIG";

/// Get the modshim config directory (not created; the config file is optional)
pub fn modshim_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Unable to determine user config directory")?
        .join("modshim");
    Ok(config_dir)
}

/// Default location of the config file
pub fn default_config_file() -> Result<PathBuf> {
    Ok(modshim_config_dir()?.join("config.toml"))
}

/// Get the main modshim data directory
pub fn modshim_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("modshim");

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data directory at {}", data_dir.display()))?;

    Ok(data_dir)
}

/// Get the directory holding the module command logs
pub fn command_logs_dir() -> Result<PathBuf> {
    let logs_dir = modshim_data_dir()?.join("command_logs");
    std::fs::create_dir_all(&logs_dir)
        .with_context(|| format!("creating command logs directory at {}", logs_dir.display()))?;
    Ok(logs_dir)
}
