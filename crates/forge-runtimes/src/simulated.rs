//! Simulated runtime for environments without a Node toolchain
//!
//! Processes are fakes that print plausible output. Installs succeed, dev
//! servers run until killed and never announce a URL, so the orchestrator
//! resolves them through its placeholder path.

use async_trait::async_trait;
use forge_core::sandbox::{ProcessPipe, RuntimeKind, SandboxProcess, SandboxRuntime};
use forge_core::Result;
use forge_types::{MountNode, MountTree, ServerReady};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

/// Pause between fake output lines
const LINE_DELAY: Duration = Duration::from_millis(150);

/// Exit code of a dev server stopped by SIGTERM
const TERMINATED: i32 = 143;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FakeCommand {
    Install,
    DevServer,
    Other,
}

fn recognize(command: &str, args: &[String]) -> FakeCommand {
    let first = args.first().map(String::as_str);
    let second = args.get(1).map(String::as_str);
    match (command, first, second) {
        ("npm" | "pnpm" | "yarn", Some("install" | "i" | "ci"), _) => FakeCommand::Install,
        ("npm" | "pnpm" | "yarn", Some("run"), Some("dev" | "start")) => FakeCommand::DevServer,
        ("pnpm" | "yarn", Some("dev" | "start"), _) => FakeCommand::DevServer,
        _ => FakeCommand::Other,
    }
}

/// Stand-in runtime that never fails and never serves anything
pub struct SimulatedRuntime {
    mounted_files: AtomicUsize,
    ready: broadcast::Sender<ServerReady>,
}

impl SimulatedRuntime {
    pub fn new() -> Self {
        let (ready, _) = broadcast::channel(1);
        Self {
            mounted_files: AtomicUsize::new(0),
            ready,
        }
    }

    /// Number of files in the last mounted tree
    pub fn mounted_files(&self) -> usize {
        self.mounted_files.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn count_files(tree: &MountTree) -> usize {
    tree.values()
        .map(|node| match node {
            MountNode::File { .. } => 1,
            MountNode::Directory(children) => count_files(children),
        })
        .sum()
}

/// Emit lines with a short pause between them. Returns false once the
/// consumer has gone away.
async fn emit(output: &mpsc::Sender<String>, lines: &[String]) -> bool {
    for line in lines {
        tokio::time::sleep(LINE_DELAY).await;
        if output.send(line.clone()).await.is_err() {
            return false;
        }
    }
    true
}

#[async_trait]
impl SandboxRuntime for SimulatedRuntime {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Simulated
    }

    fn name(&self) -> &str {
        "simulated"
    }

    async fn check_support(&self) -> Result<()> {
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.mounted_files.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn mount(&self, tree: &MountTree) -> Result<()> {
        let files = count_files(tree);
        self.mounted_files.store(files, Ordering::SeqCst);
        debug!("Simulated mount of {} files", files);
        Ok(())
    }

    async fn spawn(&self, command: &str, args: &[String]) -> Result<SandboxProcess> {
        let (pipe, process) = SandboxProcess::pipe();
        let ProcessPipe { output, exit, kill } = pipe;
        let invocation = std::iter::once(command.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        let files = self.mounted_files();

        let kind = recognize(command, args);
        debug!("Simulating `{}` as {:?}", invocation, kind);

        tokio::spawn(async move {
            match kind {
                FakeCommand::Install => {
                    let lines = [
                        format!("$ {}", invocation),
                        "Resolving dependencies (simulated)".to_string(),
                        format!("Prepared {} project files", files),
                        "added 0 packages in 0.4s (simulated)".to_string(),
                    ];
                    tokio::select! {
                        _ = emit(&output, &lines) => {
                            drop(output);
                            let _ = exit.send(0);
                        }
                        _ = kill => {
                            let _ = exit.send(TERMINATED);
                        }
                    }
                }
                FakeCommand::DevServer => {
                    let lines = [
                        format!("$ {}", invocation),
                        "Starting dev server (simulated)".to_string(),
                        "No live server is available in this environment".to_string(),
                    ];
                    emit(&output, &lines).await;
                    // Runs until stopped, like a real dev server
                    let _ = kill.await;
                    drop(output);
                    let _ = exit.send(TERMINATED);
                }
                FakeCommand::Other => {
                    emit(&output, &[format!("$ {}", invocation)]).await;
                    drop(output);
                    let _ = exit.send(0);
                }
            }
        });

        Ok(process)
    }

    fn subscribe_ready(&self) -> broadcast::Receiver<ServerReady> {
        self.ready.subscribe()
    }

    async fn teardown(&self) -> Result<()> {
        self.mounted_files.store(0, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_recognize() {
        assert_eq!(recognize("npm", &args(&["install"])), FakeCommand::Install);
        assert_eq!(recognize("npm", &args(&["run", "dev"])), FakeCommand::DevServer);
        assert_eq!(recognize("pnpm", &args(&["dev"])), FakeCommand::DevServer);
        assert_eq!(recognize("node", &args(&["--version"])), FakeCommand::Other);
    }

    #[tokio::test(start_paused = true)]
    async fn test_install_succeeds() {
        let runtime = SimulatedRuntime::new();
        let mut tree = MountTree::new();
        tree.insert(
            "index.html".to_string(),
            MountNode::File {
                contents: "<p></p>".to_string(),
            },
        );
        runtime.mount(&tree).await.unwrap();
        assert_eq!(runtime.mounted_files(), 1);

        let process = runtime.spawn("npm", &args(&["install"])).await.unwrap();
        let (mut output, mut control) = process.into_parts();
        let mut lines = Vec::new();
        while let Some(line) = output.recv().await {
            lines.push(line);
        }
        assert_eq!(lines[0], "$ npm install");
        assert!(lines.iter().any(|l| l.contains("1 project files")));
        assert_eq!(control.wait().await, Some(0));
        runtime.clear().await.unwrap();
        assert_eq!(runtime.mounted_files(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dev_server_runs_until_killed() {
        let runtime = SimulatedRuntime::new();
        let process = runtime.spawn("npm", &args(&["run", "dev"])).await.unwrap();
        let (_output, mut control) = process.into_parts();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(control.try_exit_code(), None);

        assert!(control.kill());
        assert_eq!(control.wait().await, Some(TERMINATED));
    }
}
