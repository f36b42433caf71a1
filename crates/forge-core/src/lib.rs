//! Forge - Core Library
//!
//! Turns a natural-language request into a runnable project: classification,
//! response parsing, scaffolding, file-tree assembly and sandboxed preview.

pub mod assembler;
pub mod classifier;
pub mod config;
pub mod error;
pub mod images;
pub mod parser;
pub mod pipeline;
pub mod provider;
pub mod quota;
pub mod sample_data;
pub mod sandbox;
pub mod scaffold;
pub mod watcher;

pub use assembler::{build_tree, build_tree_from, merge, to_mount_tree, FileTreeExt};
pub use classifier::classify;
pub use config::*;
pub use error::*;
pub use images::{ImageChecker, ImageReport};
pub use parser::{parse_response, ResponseParser};
pub use pipeline::GenerationPipeline;
pub use provider::{OpenAiProvider, TextGenerator};
pub use quota::{DailyQuota, FileQuota, MemoryQuota, Unlimited, UsageGate};
pub use sample_data::SampleData;
pub use sandbox::{
    Orchestrator, OrchestratorOptions, RuntimeKind, SandboxProcess, SandboxRuntime,
};
pub use scaffold::{scaffold, ScaffoldGenerator};
pub use watcher::{ProjectWatcher, WatchEvent};

pub use forge_types;
