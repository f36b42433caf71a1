//! Preview command - Run a project in a sandbox and keep it running

use crate::settings;
use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use forge_core::{FileTreeExt, Orchestrator, ProjectWatcher, RuntimeChoice};
use forge_types::{FileTree, SessionSnapshot, SessionStatus};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::debug;

const WATCH_DEBOUNCE: Duration = Duration::from_millis(500);

pub async fn run(dir: &Path, runtime: Option<RuntimeChoice>, watch: bool) -> Result<()> {
    let (mut config, source) = settings::load()?;
    if let Some(choice) = runtime {
        config.sandbox.runtime = choice;
    }
    debug!("Using configuration from {}", settings::describe_source(&source));

    let tree = load_tree(dir).await?;
    println!(
        "{} {} ({} files)",
        "🚀 Previewing".cyan().bold(),
        dir.display(),
        tree.len()
    );

    let mut orchestrator = forge_runtimes::create_orchestrator(&config.sandbox).await;
    println!(
        "   Runtime: {} ({})",
        orchestrator.runtime_name().cyan(),
        orchestrator.runtime_kind()
    );
    println!();

    let snapshot = run_session(&mut orchestrator, tree, false).await;
    if !report(&snapshot) {
        orchestrator.dispose().await;
        return Err(anyhow!("Preview failed"));
    }

    if watch {
        let mut watcher = ProjectWatcher::watch(dir, WATCH_DEBOUNCE)
            .map_err(|e| anyhow!("Failed to start watcher: {}", e))?;
        println!();
        println!(
            "{} {} {}",
            "👀 Watching".yellow(),
            watcher.root().display(),
            "for changes... (Ctrl+C to stop)".yellow()
        );

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                batch = watcher.next_batch() => match batch {
                    Some(Ok(paths)) => {
                        println!();
                        for path in &paths {
                            println!("{} {}", "📝 Changed:".yellow(), path.display());
                        }
                        match load_tree(dir).await {
                            Ok(tree) => {
                                let snapshot = run_session(&mut orchestrator, tree, true).await;
                                report(&snapshot);
                            }
                            Err(e) => println!("{} {}", "❌ Reload failed:".red(), e),
                        }
                    }
                    Some(Err(e)) => println!("{} {}", "⚠️ Watch error:".yellow(), e),
                    None => break,
                },
            }
        }
    } else {
        println!();
        println!("{}", "Press Ctrl+C to stop the preview".dimmed());
        tokio::signal::ctrl_c().await?;
    }

    println!();
    println!("{}", "👋 Stopping preview...".yellow());
    orchestrator.dispose().await;
    Ok(())
}

async fn load_tree(dir: &Path) -> Result<FileTree> {
    let tree = FileTree::read_from(dir)
        .await
        .with_context(|| format!("Failed to read {}", dir.display()))?;
    if tree.is_empty() {
        return Err(anyhow!("{} contains no project files", dir.display()));
    }
    Ok(tree)
}

/// Run one session with a spinner that follows the status and echoes logs
async fn run_session(orchestrator: &mut Orchestrator, tree: FileTree, refresh: bool) -> SessionSnapshot {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(120));

    let status_task = follow_status(orchestrator, spinner.clone());
    let log_task = echo_logs(orchestrator, spinner.clone());

    let snapshot = if refresh {
        orchestrator.refresh(tree).await
    } else {
        orchestrator.start(tree).await
    };

    status_task.abort();
    log_task.abort();
    spinner.finish_and_clear();
    snapshot
}

fn follow_status(orchestrator: &Orchestrator, spinner: ProgressBar) -> JoinHandle<()> {
    let mut updates = orchestrator.subscribe();
    tokio::spawn(async move {
        loop {
            let status = updates.borrow_and_update().status;
            spinner.set_message(format!("{}...", status.label()));
            if updates.changed().await.is_err() {
                break;
            }
        }
    })
}

fn echo_logs(orchestrator: &Orchestrator, spinner: ProgressBar) -> JoinHandle<()> {
    let mut logs = orchestrator.subscribe_logs();
    tokio::spawn(async move {
        loop {
            match logs.recv().await {
                Ok(line) => spinner.println(format!("   {}", line.dimmed())),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Print the outcome; returns whether the preview is up
fn report(snapshot: &SessionSnapshot) -> bool {
    match snapshot.status {
        SessionStatus::Ready => {
            let endpoint = snapshot.preview_endpoint.as_deref().unwrap_or_default();
            if endpoint.starts_with("data:") {
                println!(
                    "{} Simulated preview ready (no live server in this environment)",
                    "✅".green()
                );
                println!("   Paste the data URL below into a browser to view it:");
                println!("   {}", endpoint.dimmed());
            } else {
                println!("{} Preview ready at {}", "✅".green(), endpoint.cyan().bold());
            }
            if snapshot.install_skipped {
                println!("   {}", "Dependencies unchanged, install skipped".dimmed());
            }
            true
        }
        _ => {
            println!("{} {}", "❌".red(), SessionStatus::Failed.label().red().bold());
            if let Some(detail) = &snapshot.error_detail {
                for line in detail.lines() {
                    println!("   {}", line);
                }
            }
            false
        }
    }
}
