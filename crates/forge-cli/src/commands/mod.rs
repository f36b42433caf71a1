//! CLI command implementations

pub mod classify;
pub mod config;
pub mod doctor;
pub mod generate;
pub mod parse;
pub mod preview;
pub mod quota;
pub mod scaffold;
pub mod tree;

use anyhow::Result;
use colored::Colorize;
use forge_core::FileTreeExt;
use forge_types::FileTree;
use std::path::Path;

/// Write a tree into `dir`, asking first when existing files would be
/// replaced
pub(crate) async fn write_tree(tree: &FileTree, dir: &Path, yes: bool) -> Result<bool> {
    let existing: Vec<&str> = tree.paths().filter(|p| dir.join(p).exists()).collect();

    if !existing.is_empty() && !yes {
        println!(
            "{} {} file(s) already exist in {}",
            "⚠️".yellow(),
            existing.len(),
            dir.display()
        );
        for path in existing.iter().take(10) {
            println!("   {}", path.dimmed());
        }
        let confirm = dialoguer::Confirm::new()
            .with_prompt("Overwrite them?")
            .default(false)
            .interact()?;
        if !confirm {
            println!("{}", "Nothing written.".yellow());
            return Ok(false);
        }
    }

    let written = tree.write_to(dir).await?;
    println!(
        "{} Wrote {} files to {}",
        "✅".green(),
        written,
        dir.display().to_string().cyan()
    );
    Ok(true)
}
