//! Doctor command - Diagnostics

use crate::settings;
use anyhow::Result;
use colored::Colorize;
use forge_core::{ConfigManager, Orchestrator, OrchestratorOptions};
use forge_runtimes::NodeRuntime;

pub async fn execute() -> Result<()> {
    println!("{}", "🔍 Forge Diagnostics".blue().bold());
    println!();

    println!("{}", "System:".cyan());
    println!("   OS: {} {}", std::env::consts::OS, std::env::consts::ARCH);
    println!();

    println!("{}", "Dependencies:".cyan());
    let node = check_binary("node", "Node.js");
    let npm = check_binary("npm", "npm");
    if node && npm {
        probe_versions().await;
    } else {
        println!(
            "      Previews will use the {} runtime",
            "simulated".yellow()
        );
    }
    println!();

    println!("{}", "Configuration:".cyan());
    match settings::load() {
        Ok((config, source)) => {
            println!(
                "   {} Loaded from {}",
                "✓".green(),
                settings::describe_source(&source).dimmed()
            );
            let result = ConfigManager::new().validate(&config);
            for error in &result.errors {
                println!("   {} {}: {}", "✗".red(), error.field, error.message);
            }
            for warning in &result.warnings {
                println!("   {} {}: {}", "!".yellow(), warning.field, warning.message);
            }
            if result.valid && result.warnings.is_empty() {
                println!("   {} Configuration is valid", "✓".green());
            }
        }
        Err(e) => {
            println!("   {} Failed to load settings: {}", "✗".red(), e);
        }
    }
    println!();

    println!("{}", "Done!".green().bold());

    Ok(())
}

fn check_binary(name: &str, description: &str) -> bool {
    match which::which(name) {
        Ok(path) => {
            let path_str = path.display().to_string();
            println!("   {} {} - {}", "✓".green(), description, path_str.dimmed());
            true
        }
        Err(_) => {
            println!("   {} {} - {}", "✗".red(), description, "not found".red());
            false
        }
    }
}

/// Run `--version` probes through the native sandbox
async fn probe_versions() {
    let dir = std::env::temp_dir();
    let mut orchestrator = Orchestrator::new(
        Box::new(NodeRuntime::in_dir(&dir)),
        OrchestratorOptions::default(),
    );

    for program in ["node", "npm"] {
        match orchestrator.exec(program, &["--version".to_string()]).await {
            Ok(0) => {
                let version = orchestrator.snapshot().log_lines.last().cloned().unwrap_or_default();
                println!("      {} {}", program, version.trim().dimmed());
            }
            Ok(code) => println!("      {} {} exited with {}", "✗".red(), program, code),
            Err(e) => println!("      {} {}: {}", "✗".red(), program, e),
        }
    }
}
