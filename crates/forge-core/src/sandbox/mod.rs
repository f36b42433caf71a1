//! Sandboxed preview: runtime port, session state and the orchestrator

pub mod orchestrator;
pub mod runtime;
pub mod session;

pub use orchestrator::{placeholder_endpoint, Orchestrator, OrchestratorOptions};
pub use runtime::{
    split_command, ProcessControl, ProcessPipe, RuntimeKind, SandboxProcess, SandboxRuntime,
    PROCESS_OUTPUT_BUFFER,
};
pub use session::{LogBuffer, LogSink, SandboxSession};
