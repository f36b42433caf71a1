//! Config command - Show, create and validate configuration

use crate::settings;
use anyhow::{anyhow, Result};
use colored::Colorize;
use forge_core::{forge_home, ConfigManager, ForgeConfig, CONFIG_FILE_NAMES, HOME_CONFIG_FILE};

pub async fn show() -> Result<()> {
    let (mut config, source) = settings::load()?;

    // Never echo the key itself
    if let Some(key) = config.provider.api_key.as_mut() {
        *key = mask(key);
    }

    println!("{}", "⚙️  Forge Configuration".cyan().bold());
    println!("   Source: {}", settings::describe_source(&source).dimmed());
    println!();
    print!("{}", serde_yaml::to_string(&config)?);

    Ok(())
}

pub async fn init(global: bool, force: bool) -> Result<()> {
    let path = if global {
        forge_home().join(HOME_CONFIG_FILE)
    } else {
        std::env::current_dir()?.join(CONFIG_FILE_NAMES[0])
    };

    if path.exists() && !force {
        println!(
            "{} Configuration file already exists: {}",
            "⚠️".yellow(),
            path.display()
        );
        return Ok(());
    }

    ConfigManager::new().save(&ForgeConfig::default(), &path)?;
    println!("{} Created {}", "✅".green(), path.display().to_string().cyan());
    println!();
    println!("Next steps:");
    println!("  1. Set {} or provider.api_key", "FORGE_API_KEY".cyan());
    println!("  2. Run {} to check your setup", "forge doctor".cyan());

    Ok(())
}

pub async fn validate() -> Result<()> {
    println!("{}", "🔍 Validating Forge configuration...".cyan().bold());

    let (config, source) = settings::load()?;
    println!("  📁 Config: {}", settings::describe_source(&source).dimmed());
    println!();

    let result = ConfigManager::new().validate(&config);

    if result.valid {
        println!("  {} Schema is valid", "✅".green());
    } else {
        println!("  {} Schema validation failed", "❌".red());
        for error in &result.errors {
            println!("      {} {}: {}", "•".red(), error.field.red(), error.message);
        }
    }

    for warning in &result.warnings {
        println!("  {} {}: {}", "⚠️".yellow(), warning.field.yellow(), warning.message);
        if let Some(ref suggestion) = warning.suggestion {
            println!("      💡 {}", suggestion.dimmed());
        }
    }

    println!();
    if !result.valid {
        println!("{}", "❌ Validation failed - please fix the errors above".red().bold());
        return Err(anyhow!("Validation failed"));
    }
    println!("{}", "✅ Configuration is valid!".green().bold());

    Ok(())
}

fn mask(key: &str) -> String {
    let visible: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    if key.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("****{}", visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask() {
        assert_eq!(mask("short"), "****");
        assert_eq!(mask("sk-1234567890abcd"), "****abcd");
    }
}
