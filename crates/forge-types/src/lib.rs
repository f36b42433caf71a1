//! Forge Types - Pure value types
//!
//! Data shared between the generator core, the sandbox runtimes, the CLI and
//! the HTTP server. Nothing in here touches the filesystem or an async runtime.

pub mod api;
pub mod file_tree;
pub mod generation;
pub mod project;
pub mod session;

pub use api::*;
pub use file_tree::*;
pub use generation::*;
pub use project::*;
pub use session::*;
