//! Tree command - Print a project's file tree

use anyhow::{Context, Result};
use colored::Colorize;
use forge_core::{build_tree, FileTreeExt};
use forge_types::{FileTree, TreeNode};
use std::path::Path;

pub async fn run(dir: &Path) -> Result<()> {
    let files = FileTree::read_from(dir)
        .await
        .with_context(|| format!("Failed to read {}", dir.display()))?;
    let root = build_tree(&files);

    println!("{}", dir.display().to_string().cyan().bold());
    print!("{}", render(&root));
    println!();
    println!(
        "{} files, {} bytes",
        files.len(),
        files.total_bytes()
    );

    let conflicts = files.conflicts();
    if !conflicts.is_empty() {
        println!(
            "{} Paths used as both file and directory: {}",
            "⚠️".yellow(),
            conflicts.join(", ")
        );
    }

    Ok(())
}

/// Render the children of `root` with box-drawing connectors
pub(crate) fn render(root: &TreeNode) -> String {
    let mut out = String::new();
    render_children(root, "", &mut out);
    out
}

fn render_children(node: &TreeNode, prefix: &str, out: &mut String) {
    let count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        let last = i + 1 == count;
        let connector = if last { "└── " } else { "├── " };
        let name = if child.is_dir() {
            format!("{}/", child.name)
        } else {
            child.name.clone()
        };
        out.push_str(&format!("{}{}{}\n", prefix, connector, name));
        if child.is_dir() {
            let extension = if last { "    " } else { "│   " };
            render_children(child, &format!("{}{}", prefix, extension), out);
        }
    }
}
