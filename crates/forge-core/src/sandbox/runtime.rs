//! Sandbox runtime port
//!
//! The orchestrator drives any environment that can mount a nested file tree,
//! spawn processes with a streamed output and an exit code, and announce when
//! a dev server starts listening.

use crate::error::Result;
use async_trait::async_trait;
use forge_types::{MountTree, ServerReady};
use tokio::sync::{broadcast, mpsc, oneshot};

/// Output lines buffered per process before the producer waits
pub const PROCESS_OUTPUT_BUFFER: usize = 256;

/// Which kind of environment a runtime is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    /// Real processes; a missing ready event is a failure
    Native,
    /// Fallback that fakes process output; a missing ready event yields a
    /// placeholder preview
    Simulated,
}

impl RuntimeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeKind::Native => "native",
            RuntimeKind::Simulated => "simulated",
        }
    }
}

impl std::fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Isolated environment that can install and run a project
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    fn kind(&self) -> RuntimeKind;

    /// Human readable runtime name
    fn name(&self) -> &str;

    /// Fails with [`crate::ForgeError::RuntimeUnsupported`] when the runtime
    /// cannot operate in the current environment
    async fn check_support(&self) -> Result<()>;

    /// Drop files left by an earlier session so the next mount starts from
    /// scratch. Installed dependencies may be kept.
    async fn clear(&self) -> Result<()>;

    /// Make the tree available to processes spawned afterwards. Files from an
    /// earlier mount that `tree` no longer has are removed.
    async fn mount(&self, tree: &MountTree) -> Result<()>;

    async fn spawn(&self, command: &str, args: &[String]) -> Result<SandboxProcess>;

    /// Subscribe to "server ready" announcements
    fn subscribe_ready(&self) -> broadcast::Receiver<ServerReady>;

    /// Release everything the runtime holds (scratch files, processes)
    async fn teardown(&self) -> Result<()>;
}

/// Handle to a process running inside a sandbox.
///
/// The output stream and the control half are separate so log forwarding and
/// process lifetime can be owned by different tasks.
pub struct SandboxProcess {
    pub output: mpsc::Receiver<String>,
    pub control: ProcessControl,
}

impl SandboxProcess {
    /// Create a connected producer/consumer pair. Runtimes keep the
    /// [`ProcessPipe`] and hand the [`SandboxProcess`] to the caller.
    pub fn pipe() -> (ProcessPipe, SandboxProcess) {
        let (output_tx, output_rx) = mpsc::channel(PROCESS_OUTPUT_BUFFER);
        let (exit_tx, exit_rx) = oneshot::channel();
        let (kill_tx, kill_rx) = oneshot::channel();

        let pipe = ProcessPipe {
            output: output_tx,
            exit: exit_tx,
            kill: kill_rx,
        };
        let process = SandboxProcess {
            output: output_rx,
            control: ProcessControl {
                exit: exit_rx,
                exit_code: None,
                kill: Some(kill_tx),
            },
        };
        (pipe, process)
    }

    pub fn into_parts(self) -> (mpsc::Receiver<String>, ProcessControl) {
        (self.output, self.control)
    }
}

/// Runtime side of a [`SandboxProcess`]
pub struct ProcessPipe {
    pub output: mpsc::Sender<String>,
    pub exit: oneshot::Sender<i32>,
    /// Resolves when the caller asks for termination (or drops the handle)
    pub kill: oneshot::Receiver<()>,
}

/// Exit and kill half of a [`SandboxProcess`]
pub struct ProcessControl {
    exit: oneshot::Receiver<i32>,
    exit_code: Option<Option<i32>>,
    kill: Option<oneshot::Sender<()>>,
}

impl ProcessControl {
    /// Ask the runtime to terminate the process. Returns false if the kill
    /// request could not be delivered (already killed or already exited).
    pub fn kill(&mut self) -> bool {
        match self.kill.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Wait for the exit code. `None` when the runtime dropped the process
    /// without reporting one.
    pub async fn wait(&mut self) -> Option<i32> {
        if let Some(code) = self.exit_code {
            return code;
        }
        let code = (&mut self.exit).await.ok();
        self.exit_code = Some(code);
        code
    }

    /// Exit code if the process has already finished
    pub fn try_exit_code(&mut self) -> Option<i32> {
        if let Some(code) = self.exit_code {
            return code;
        }
        match self.exit.try_recv() {
            Ok(code) => {
                self.exit_code = Some(Some(code));
                Some(code)
            }
            Err(oneshot::error::TryRecvError::Closed) => {
                self.exit_code = Some(None);
                None
            }
            Err(oneshot::error::TryRecvError::Empty) => None,
        }
    }
}

/// Split a configured command line ("npm run dev") into program and args
pub fn split_command(command: &str) -> Option<(String, Vec<String>)> {
    let mut parts = command.split_whitespace().map(|s| s.to_string());
    let program = parts.next()?;
    Some((program, parts.collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pipe_roundtrip() {
        let (pipe, process) = SandboxProcess::pipe();
        let (mut output, mut control) = process.into_parts();

        pipe.output.send("hello".to_string()).await.unwrap();
        drop(pipe.output);
        pipe.exit.send(3).unwrap();

        assert_eq!(output.recv().await.as_deref(), Some("hello"));
        assert_eq!(output.recv().await, None);
        assert_eq!(control.wait().await, Some(3));
        // Cached after the first wait
        assert_eq!(control.wait().await, Some(3));
    }

    #[tokio::test]
    async fn test_kill_reaches_runtime() {
        let (pipe, process) = SandboxProcess::pipe();
        let (_output, mut control) = process.into_parts();
        assert!(control.kill());
        assert!(pipe.kill.await.is_ok());
        assert!(!control.kill());
    }

    #[tokio::test]
    async fn test_dropped_runtime_reports_no_code() {
        let (pipe, process) = SandboxProcess::pipe();
        let (_output, mut control) = process.into_parts();
        assert_eq!(control.try_exit_code(), None);
        drop(pipe);
        assert_eq!(control.wait().await, None);
    }

    #[test]
    fn test_split_command() {
        assert_eq!(
            split_command("npm run dev"),
            Some(("npm".to_string(), vec!["run".to_string(), "dev".to_string()]))
        );
        assert_eq!(split_command("   "), None);
    }
}
