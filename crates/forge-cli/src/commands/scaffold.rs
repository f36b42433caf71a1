//! Scaffold command - Write the baseline project files for a request

use anyhow::{anyhow, Result};
use colored::Colorize;
use forge_core::classifier::{classify, dependencies_for, dev_dependencies_for};
use forge_core::ScaffoldGenerator;
use forge_types::Archetype;
use std::path::Path;

pub async fn run(
    request: &str,
    archetype: Option<&str>,
    name: Option<String>,
    out: &Path,
    yes: bool,
) -> Result<()> {
    let mut config = classify(request);

    if let Some(name) = archetype {
        let forced = Archetype::from_name(name).ok_or_else(|| {
            let known: Vec<&str> = Archetype::all().iter().map(|a| a.as_str()).collect();
            anyhow!("Unknown project type '{}' (expected one of: {})", name, known.join(", "))
        })?;
        config.archetype = forced;
        config.dependencies = dependencies_for(forced, &config.features);
        config.dev_dependencies = dev_dependencies_for(forced);
    }

    let mut generator = ScaffoldGenerator::new(&config);
    if let Some(name) = name {
        generator = generator.with_name(name);
    }

    println!(
        "{} {} ({})",
        "🏗️  Scaffolding".cyan().bold(),
        generator.name().cyan(),
        config.archetype.as_str().dimmed()
    );

    let tree = generator.generate();
    for path in tree.paths() {
        println!("   {}", path);
    }
    println!();

    tokio::fs::create_dir_all(out).await?;
    if super::write_tree(&tree, out, yes).await? && config.is_multi_file() {
        println!();
        println!("Next steps:");
        println!("  1. Add your source files under {}", "src/".cyan());
        println!("  2. Run {} to preview", "forge preview".cyan());
    }

    Ok(())
}
