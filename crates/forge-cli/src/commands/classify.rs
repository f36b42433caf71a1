//! Classify command - Show the project configuration for a request

use anyhow::Result;
use colored::Colorize;
use forge_core::classify;

pub async fn run(request: &str, json: bool) -> Result<()> {
    let config = classify(request);

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("{}", "🔎 Classification".cyan().bold());
    println!("   Project type: {}", config.archetype.as_str().green());
    println!(
        "   Output:       {}",
        if config.is_multi_file() {
            "multi-file project"
        } else {
            "single HTML document"
        }
    );

    if config.features.is_empty() {
        println!("   Features:     {}", "none".dimmed());
    } else {
        let features: Vec<&str> = config.features.iter().map(|f| f.as_str()).collect();
        println!("   Features:     {}", features.join(", "));
    }

    if !config.dependencies.is_empty() {
        println!("   Dependencies: {}", config.dependencies.join(", ").dimmed());
    }
    if !config.dev_dependencies.is_empty() {
        println!("   Dev deps:     {}", config.dev_dependencies.join(", ").dimmed());
    }

    Ok(())
}
