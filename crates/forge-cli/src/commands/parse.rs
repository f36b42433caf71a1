//! Parse command - Extract code from a saved generator response

use anyhow::{Context, Result};
use colored::Colorize;
use forge_core::ResponseParser;
use forge_types::{FileTree, GeneratedCode};
use std::path::Path;
use tokio::io::AsyncReadExt;

pub async fn run(file: Option<&Path>, multi_file: bool, out: Option<&Path>) -> Result<()> {
    let text = match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            tokio::io::stdin().read_to_string(&mut buffer).await?;
            buffer
        }
    };

    let parser = if multi_file {
        ResponseParser::new()
    } else {
        ResponseParser::for_archetype(forge_types::Archetype::SingleFile)
    };
    let parsed = parser.parse(&text);

    println!("{}", "📄 Parsed response".cyan().bold());
    println!("   Extraction: {:?}", parsed.extraction);
    if !parsed.explanation.is_empty() {
        println!();
        println!("{}", parsed.explanation);
    }
    println!();

    let tree = match &parsed.code {
        GeneratedCode::Project { files } => {
            println!("{} {} files", "📦".green(), files.len());
            for path in files.paths() {
                println!("   {}", path);
            }
            files.clone()
        }
        GeneratedCode::SingleFile { code, language } if !code.is_empty() => {
            println!(
                "{} {} document, {} bytes",
                "📝".green(),
                language,
                code.len()
            );
            let mut tree = FileTree::new();
            tree.insert(single_file_name(language), code.clone());
            tree
        }
        GeneratedCode::SingleFile { .. } => {
            println!("{}", "No code found in the response".yellow());
            return Ok(());
        }
    };

    if let Some(dir) = out {
        println!();
        tokio::fs::create_dir_all(dir).await?;
        super::write_tree(&tree, dir, false).await?;
    }

    Ok(())
}

/// File name for a single extracted document
pub(crate) fn single_file_name(language: &str) -> String {
    match language {
        "html" | "" => "index.html".to_string(),
        "javascript" => "index.js".to_string(),
        "typescript" => "index.ts".to_string(),
        other => format!("index.{}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_file_name() {
        assert_eq!(single_file_name("html"), "index.html");
        assert_eq!(single_file_name("typescript"), "index.ts");
        assert_eq!(single_file_name("css"), "index.css");
    }
}
