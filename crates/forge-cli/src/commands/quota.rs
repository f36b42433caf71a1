//! Quota command - Daily generation allowance

use crate::settings;
use anyhow::Result;
use colored::Colorize;
use forge_core::{forge_home, FileQuota, UsageGate};

pub async fn show() -> Result<()> {
    let (config, _) = settings::load()?;
    println!("{}", "📊 Daily quota".cyan().bold());

    if !config.quota.enabled {
        println!("   {}", "Quota is disabled; generation is unlimited".green());
        return Ok(());
    }

    let quota = FileQuota::in_home(&forge_home(), config.quota.daily_limit);
    if let Some(status) = quota.status().await? {
        let remaining = if status.remaining == 0 {
            status.remaining.to_string().red()
        } else {
            status.remaining.to_string().green()
        };
        println!("   Used:      {}/{}", status.used, status.limit);
        println!("   Remaining: {}", remaining);
        println!("   Day:       {}", status.last_reset);
        println!("   File:      {}", quota.path().display().to_string().dimmed());
    }

    Ok(())
}

pub async fn reset() -> Result<()> {
    let (config, _) = settings::load()?;
    let quota = FileQuota::in_home(&forge_home(), config.quota.daily_limit);
    quota.reset().await?;
    println!("{} Today's usage has been cleared", "✅".green());
    Ok(())
}
