//! Generate command - Run one generation and write the result

use crate::settings;
use anyhow::{Context, Result};
use colored::Colorize;
use forge_core::{
    forge_home, FileQuota, GenerationPipeline, ImageChecker, OpenAiProvider, Unlimited, UsageGate,
};
use forge_types::{ChatRequest, ChatResponse, FileTree};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub async fn run(request: &str, out: &Path, yes: bool) -> Result<()> {
    let (config, _) = settings::load()?;

    let provider = OpenAiProvider::new(config.provider.clone())
        .context("Cannot create the text-generation client")?;
    let gate: Arc<dyn UsageGate> = if config.quota.enabled {
        Arc::new(FileQuota::in_home(&forge_home(), config.quota.daily_limit))
    } else {
        Arc::new(Unlimited)
    };
    let pipeline =
        GenerationPipeline::new(Arc::new(provider), gate).with_image_checker(ImageChecker::new());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
    spinner.set_message(format!("Generating with {}...", config.provider.model));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let chat = ChatRequest {
        message: request.to_string(),
        history: Vec::new(),
    };
    let result = pipeline.run(&chat).await;
    spinner.finish_and_clear();
    let response = result?;

    if !response.message().is_empty() {
        println!("{}", response.message());
        println!();
    }

    let tree = match response {
        ChatResponse::MultiFile {
            file_tree,
            project_type,
            ..
        } => {
            println!(
                "{} {} project with {} files",
                "📦".green(),
                project_type.as_str().cyan(),
                file_tree.len()
            );
            file_tree
        }
        ChatResponse::SingleFile {
            code,
            language,
            image_validation,
            ..
        } => {
            if code.is_empty() {
                println!("{}", "The response contained no code.".yellow());
                return Ok(());
            }
            if let Some(summary) = image_validation {
                println!("   Images reachable: {}", summary);
            }
            let mut tree = FileTree::new();
            tree.insert(super::parse::single_file_name(&language), code);
            tree
        }
    };

    tokio::fs::create_dir_all(out).await?;
    if super::write_tree(&tree, out, yes).await? {
        println!();
        println!("Run {} to try it.", "forge preview".cyan());
    }

    Ok(())
}
