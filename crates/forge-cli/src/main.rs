//! Forge CLI
//!
//! Turns a plain-language request into a runnable web project and previews it.

mod commands;
mod settings;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use forge_core::RuntimeChoice;
use std::path::PathBuf;
use tracing::{debug, error};

#[derive(Parser)]
#[command(name = "forge")]
#[command(author, version, about = "Forge - generate and preview web projects from a prompt", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how a request would be classified
    Classify {
        /// Request text
        request: String,

        /// Print the project configuration as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the baseline scaffold for a request
    Scaffold {
        /// Request text used to pick the project type
        request: String,

        /// Force a project type (e.g. react-vite, nextjs-app, vue3)
        #[arg(short, long)]
        archetype: Option<String>,

        /// Project display name
        #[arg(short, long)]
        name: Option<String>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Overwrite without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Parse a saved generator response
    Parse {
        /// Response file (stdin when omitted)
        file: Option<PathBuf>,

        /// Also try the multi-file JSON map
        #[arg(short, long)]
        multi_file: bool,

        /// Write the extracted files into this directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Generate a project from a request
    Generate {
        /// Request text
        request: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Write files without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the file tree of a project directory
    Tree {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Install and run a project in a sandbox
    Preview {
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Sandbox runtime (auto, native, simulated)
        #[arg(short, long)]
        runtime: Option<RuntimeChoice>,

        /// Re-run the preview when files change
        #[arg(short, long)]
        watch: bool,
    },

    /// Daily generation allowance
    Quota {
        #[command(subcommand)]
        action: QuotaAction,
    },

    /// Diagnose the environment
    Doctor,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum QuotaAction {
    /// Show today's usage
    Show,
    /// Clear today's usage
    Reset,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Write to $FORGE_HOME instead of the current directory
        #[arg(short, long)]
        global: bool,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the effective configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(if cli.verbose {
            "forge_cli=debug,forge_core=debug,forge_runtimes=debug"
        } else {
            "forge_cli=info"
        })
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    debug!("Starting Forge CLI");

    let result = match cli.command {
        Commands::Classify { request, json } => commands::classify::run(&request, json).await,
        Commands::Scaffold {
            request,
            archetype,
            name,
            out,
            yes,
        } => commands::scaffold::run(&request, archetype.as_deref(), name, &out, yes).await,
        Commands::Parse {
            file,
            multi_file,
            out,
        } => commands::parse::run(file.as_deref(), multi_file, out.as_deref()).await,
        Commands::Generate { request, out, yes } => {
            commands::generate::run(&request, &out, yes).await
        }
        Commands::Tree { dir } => commands::tree::run(&dir).await,
        Commands::Preview {
            dir,
            runtime,
            watch,
        } => commands::preview::run(&dir, runtime, watch).await,
        Commands::Quota { action } => match action {
            QuotaAction::Show => commands::quota::show().await,
            QuotaAction::Reset => commands::quota::reset().await,
        },
        Commands::Doctor => commands::doctor::execute().await,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show().await,
            ConfigAction::Init { global, force } => commands::config::init(global, force).await,
            ConfigAction::Validate => commands::config::validate().await,
        },
    };

    if let Err(ref e) = result {
        error!("Command failed: {}", e);
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    result
}
