//! Effective configuration for CLI commands

use anyhow::{Context, Result};
use forge_core::{forge_home, ConfigManager, ForgeConfig};
use std::path::PathBuf;

/// Configuration for the current directory plus the file it came from
/// (`None` when running on defaults)
pub fn load() -> Result<(ForgeConfig, Option<PathBuf>)> {
    let cwd = std::env::current_dir()?;
    let mut manager = ConfigManager::new();
    manager
        .resolve(&cwd, &forge_home())
        .context("Failed to load configuration")
}

pub fn describe_source(source: &Option<PathBuf>) -> String {
    match source {
        Some(path) => path.display().to_string(),
        None => "built-in defaults".to_string(),
    }
}
