//! Sandbox runtime orchestrator
//!
//! Drives one [`SandboxSession`] at a time through
//! `Mounting -> InstallingDependencies -> StartingServer -> Ready | Failed`.
//! Expected failures (unsupported runtime, failed install, server that never
//! comes up) end the session in `Failed` and are returned as data.
//!
//! The dev server outlives the call that starts it. Its output is forwarded
//! by a separate task and the process handle is kept in [`LiveProcess`];
//! stopping one does not stop the other.

use super::runtime::{split_command, ProcessControl, RuntimeKind, SandboxRuntime};
use super::session::{LogSink, SandboxSession};
use crate::assembler::to_mount_tree;
use crate::config::SandboxSettings;
use crate::error::{ForgeError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use forge_types::{FileTree, ServerReady, SessionSnapshot, SessionStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const UNSUPPORTED_HINT: &str = "Download the project files and run them locally instead.";

/// Log lines attached to a failure
const ERROR_TAIL_LINES: usize = 10;

const MANIFEST_PATH: &str = "package.json";

/// Orchestrator tuning
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// How long StartingServer waits for a ready announcement
    pub ready_timeout: Duration,
    pub log_capacity: usize,
    pub install_command: String,
    pub dev_command: String,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(30),
            log_capacity: 20,
            install_command: "npm install".to_string(),
            dev_command: "npm run dev".to_string(),
        }
    }
}

impl OrchestratorOptions {
    /// Options for a runtime of the given kind. The simulated runtime never
    /// announces a server, so it gets the short placeholder timeout.
    pub fn from_settings(settings: &SandboxSettings, kind: RuntimeKind) -> Self {
        let ready_timeout = match kind {
            RuntimeKind::Native => Duration::from_secs(settings.ready_timeout_secs),
            RuntimeKind::Simulated => Duration::from_millis(settings.simulated_ready_timeout_ms),
        };
        Self {
            ready_timeout,
            log_capacity: settings.log_capacity,
            install_command: settings.install_command.clone(),
            dev_command: settings.dev_command.clone(),
        }
    }
}

/// A running dev server: its control handle plus the task forwarding its
/// output
struct LiveProcess {
    control: ProcessControl,
    forwarder: JoinHandle<()>,
}

impl LiveProcess {
    /// Best-effort termination; failures are logged only
    fn stop(mut self) {
        if !self.control.kill() && self.control.try_exit_code().is_none() {
            warn!("Could not deliver termination request to the dev server");
        }
        self.forwarder.abort();
    }
}

enum ServerOutcome {
    Announced(ServerReady),
    Exited(Option<i32>),
    TimedOut,
}

/// Owns the sandbox runtime and the single active session on it
pub struct Orchestrator {
    runtime: Box<dyn SandboxRuntime>,
    options: OrchestratorOptions,
    session: SandboxSession,
    logs: Arc<LogSink>,
    updates: watch::Sender<SessionSnapshot>,
    live: Option<LiveProcess>,
    current_tree: Option<FileTree>,
    /// Manifest content of the last successful install
    installed_manifest: Option<String>,
    generation: u64,
}

impl Orchestrator {
    pub fn new(runtime: Box<dyn SandboxRuntime>, options: OrchestratorOptions) -> Self {
        let logs = LogSink::new(options.log_capacity);
        let session = SandboxSession::new(0);
        let (updates, _) = watch::channel(session.snapshot(Vec::new()));

        Self {
            runtime,
            options,
            session,
            logs,
            updates,
            live: None,
            current_tree: None,
            installed_manifest: None,
            generation: 0,
        }
    }

    pub fn runtime_kind(&self) -> RuntimeKind {
        self.runtime.kind()
    }

    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot(self.logs.lines())
    }

    /// Status updates, one per transition
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    /// Every log line as it arrives, including dev server output after Ready
    pub fn subscribe_logs(&self) -> broadcast::Receiver<String> {
        self.logs.subscribe()
    }

    /// Tree of the most recent session
    pub fn current_tree(&self) -> Option<&FileTree> {
        self.current_tree.as_ref()
    }

    /// Whether a dev server from the current session is still held
    pub fn has_live_process(&self) -> bool {
        self.live.is_some()
    }

    /// Start a fresh session: mount, install, start the dev server.
    ///
    /// Any previous session is disposed first.
    pub async fn start(&mut self, tree: FileTree) -> SessionSnapshot {
        self.stop_live();
        self.installed_manifest = None;
        self.begin_session();
        self.run(tree, false).await
    }

    /// Replace the project files.
    ///
    /// When the last install succeeded and the manifest is unchanged the new
    /// session skips installation; otherwise this is a fresh [`start`].
    ///
    /// [`start`]: Orchestrator::start
    pub async fn refresh(&mut self, tree: FileTree) -> SessionSnapshot {
        let manifest = tree.get(MANIFEST_PATH).unwrap_or_default();
        let reusable = self.installed_manifest.as_deref() == Some(manifest);
        if !reusable {
            debug!("Dependencies changed or never installed, running a full session");
            return self.start(tree).await;
        }

        self.stop_live();
        self.begin_session();
        self.run(tree, true).await
    }

    /// Tear down the current session and run the same tree from scratch
    pub async fn restart(&mut self) -> Result<SessionSnapshot> {
        let tree = self
            .current_tree
            .clone()
            .ok_or_else(|| ForgeError::Other("No project has been started".to_string()))?;
        info!("Restarting sandbox session");
        Ok(self.start(tree).await)
    }

    /// Stop the dev server and release the runtime's resources
    pub async fn dispose(&mut self) {
        self.stop_live();
        self.installed_manifest = None;
        if let Err(e) = self.runtime.teardown().await {
            warn!("Sandbox teardown failed: {}", e);
        }
    }

    /// Run an arbitrary command to completion, streaming its output into the
    /// session log
    pub async fn exec(&mut self, command: &str, args: &[String]) -> Result<i32> {
        let process = self.runtime.spawn(command, args).await?;
        let (output, mut control) = process.into_parts();
        forward_logs(output, self.logs.clone()).await;
        control
            .wait()
            .await
            .ok_or_else(|| ForgeError::Process(format!("{} ended without an exit code", command)))
    }

    fn begin_session(&mut self) {
        self.generation += 1;
        self.logs.clear();
        self.session = SandboxSession::new(self.generation);
        info!(
            "Starting sandbox session {} on {} runtime",
            self.generation,
            self.runtime.kind()
        );
        self.publish();
    }

    fn publish(&self) {
        self.updates.send_replace(self.snapshot());
    }

    fn advance(&mut self, next: SessionStatus) {
        if self.session.advance(next) {
            self.publish();
        }
    }

    fn fail(&mut self, detail: impl Into<String>) -> SessionSnapshot {
        self.session.fail(detail);
        self.publish();
        self.snapshot()
    }

    fn ready(&mut self, endpoint: impl Into<String>) -> SessionSnapshot {
        self.session.ready(endpoint);
        self.publish();
        self.snapshot()
    }

    fn stop_live(&mut self) {
        if let Some(live) = self.live.take() {
            debug!("Stopping dev server of session {}", self.session.generation());
            live.stop();
        }
    }

    async fn run(&mut self, tree: FileTree, skip_install: bool) -> SessionSnapshot {
        self.current_tree = Some(tree.clone());

        if let Err(e) = self.runtime.check_support().await {
            return self.fail(format!("{}. {}", e, UNSUPPORTED_HINT));
        }

        let mount_tree = match to_mount_tree(&tree) {
            Ok(mount_tree) => mount_tree,
            Err(e) => return self.fail(e.to_string()),
        };
        if !skip_install {
            if let Err(e) = self.runtime.clear().await {
                return self.fail(format!("Failed to clear previous project files: {}", e));
            }
        }
        if let Err(e) = self.runtime.mount(&mount_tree).await {
            return self.fail(format!("Failed to mount project files: {}", e));
        }
        self.logs.push(format!("Mounted {} files", tree.len()));

        if skip_install {
            self.logs.push("Dependencies unchanged, skipping install");
            if self.session.skip_install() {
                self.publish();
            }
        } else {
            self.advance(SessionStatus::InstallingDependencies);
            if let Err(detail) = self.install().await {
                return self.fail(detail);
            }
            self.installed_manifest = Some(tree.get(MANIFEST_PATH).unwrap_or_default().to_string());
            self.advance(SessionStatus::StartingServer);
        }

        self.start_server(&tree).await
    }

    async fn install(&mut self) -> std::result::Result<(), String> {
        let command = self.options.install_command.clone();
        let (program, args) =
            split_command(&command).ok_or_else(|| "Install command is empty".to_string())?;

        let process = self
            .runtime
            .spawn(&program, &args)
            .await
            .map_err(|e| format!("Failed to start `{}`: {}", command, e))?;

        let (output, mut control) = process.into_parts();
        forward_logs(output, self.logs.clone()).await;

        match control.wait().await {
            Some(0) => Ok(()),
            Some(code) => Err(format!(
                "`{}` exited with code {}\n{}",
                command,
                code,
                self.logs.tail(ERROR_TAIL_LINES)
            )),
            None => Err(format!(
                "`{}` ended without an exit code\n{}",
                command,
                self.logs.tail(ERROR_TAIL_LINES)
            )),
        }
    }

    async fn start_server(&mut self, tree: &FileTree) -> SessionSnapshot {
        let command = self.options.dev_command.clone();
        let (program, args) = match split_command(&command) {
            Some(parts) => parts,
            None => return self.fail("Dev server command is empty"),
        };

        // Subscribe before spawning so an early announcement is not missed
        let mut ready = self.runtime.subscribe_ready();

        let process = match self.runtime.spawn(&program, &args).await {
            Ok(process) => process,
            Err(e) => return self.fail(format!("Failed to start `{}`: {}", command, e)),
        };
        let (output, mut control) = process.into_parts();
        let forwarder = tokio::spawn(forward_logs(output, self.logs.clone()));

        let outcome = tokio::select! {
            event = wait_for_ready(&mut ready) => ServerOutcome::Announced(event),
            code = control.wait() => ServerOutcome::Exited(code),
            _ = tokio::time::sleep(self.options.ready_timeout) => ServerOutcome::TimedOut,
        };
        let live = LiveProcess { control, forwarder };

        match outcome {
            ServerOutcome::Announced(event) => {
                info!("Dev server ready on port {} at {}", event.port, event.url);
                self.live = Some(live);
                self.ready(event.url)
            }
            ServerOutcome::Exited(code) => {
                live.stop();
                let code = code.map_or_else(|| "none".to_string(), |c| c.to_string());
                let detail = format!(
                    "Dev server exited before it was ready (exit code {})\n{}",
                    code,
                    self.logs.tail(ERROR_TAIL_LINES)
                );
                self.fail(detail)
            }
            ServerOutcome::TimedOut => match self.runtime.kind() {
                RuntimeKind::Simulated => {
                    info!("Simulated runtime: serving placeholder preview");
                    self.logs.push("Serving simulated preview");
                    self.live = Some(live);
                    self.ready(placeholder_endpoint(tree))
                }
                RuntimeKind::Native => {
                    live.stop();
                    let detail = format!(
                        "Dev server did not report ready within {}s\n{}",
                        self.options.ready_timeout.as_secs(),
                        self.logs.tail(ERROR_TAIL_LINES)
                    );
                    self.fail(detail)
                }
            },
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.stop_live();
    }
}

/// Copy process output into the sink until the stream closes
async fn forward_logs(mut output: mpsc::Receiver<String>, sink: Arc<LogSink>) {
    while let Some(line) = output.recv().await {
        sink.push(line);
    }
}

async fn wait_for_ready(rx: &mut broadcast::Receiver<ServerReady>) -> ServerReady {
    loop {
        match rx.recv().await {
            Ok(event) => return event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Missed {} ready announcements", skipped);
            }
            // The runtime can no longer announce; let the timeout decide
            Err(broadcast::error::RecvError::Closed) => return std::future::pending().await,
        }
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Self-contained preview document for environments without a real runtime,
/// as a `data:` URL
pub fn placeholder_endpoint(tree: &FileTree) -> String {
    let files: String = tree
        .paths()
        .map(|p| format!("      <li><code>{}</code></li>\n", escape_html(p)))
        .collect();

    let document = format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <title>Simulated preview</title>
    <style>
      body {{ font-family: system-ui, sans-serif; margin: 2rem; color: #1f2937; }}
      .note {{ padding: 1rem; border-radius: 0.5rem; background: #fef3c7; }}
    </style>
  </head>
  <body>
    <h1>Simulated preview</h1>
    <p class="note">A live dev server is not available in this environment.
    Download the project files and run <code>npm install</code> and
    <code>npm run dev</code> to see the real application.</p>
    <h2>Project files ({count})</h2>
    <ul>
{files}    </ul>
  </body>
</html>
"#,
        count = tree.len(),
        files = files
    );

    format!("data:text/html;base64,{}", STANDARD.encode(document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::runtime::SandboxProcess;
    use async_trait::async_trait;
    use forge_types::{MountNode, MountTree};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone)]
    struct Script {
        kind: RuntimeKind,
        supported: bool,
        install_exit: i32,
        announce_ready: bool,
        dev_exit: Option<i32>,
    }

    impl Script {
        fn native() -> Self {
            Self {
                kind: RuntimeKind::Native,
                supported: true,
                install_exit: 0,
                announce_ready: true,
                dev_exit: None,
            }
        }
    }

    struct ScriptedRuntime {
        script: Script,
        ready: broadcast::Sender<ServerReady>,
        spawned: Arc<Mutex<Vec<String>>>,
        files: Arc<Mutex<BTreeSet<String>>>,
        mounts: Arc<AtomicUsize>,
        kills: Arc<AtomicUsize>,
    }

    struct Probe {
        spawned: Arc<Mutex<Vec<String>>>,
        files: Arc<Mutex<BTreeSet<String>>>,
        mounts: Arc<AtomicUsize>,
        kills: Arc<AtomicUsize>,
    }

    impl Probe {
        fn spawned(&self) -> Vec<String> {
            self.spawned.lock().unwrap().clone()
        }

        fn files(&self) -> Vec<String> {
            self.files.lock().unwrap().iter().cloned().collect()
        }
    }

    fn collect_files(prefix: &str, level: &MountTree, out: &mut BTreeSet<String>) {
        for (name, node) in level {
            let path = format!("{}{}", prefix, name);
            match node {
                MountNode::File { .. } => {
                    out.insert(path);
                }
                MountNode::Directory(children) => {
                    collect_files(&format!("{}/", path), children, out)
                }
            }
        }
    }

    fn scripted(script: Script) -> (Box<dyn SandboxRuntime>, Probe) {
        let (ready, _) = broadcast::channel(4);
        let runtime = ScriptedRuntime {
            script,
            ready,
            spawned: Arc::new(Mutex::new(Vec::new())),
            files: Arc::new(Mutex::new(BTreeSet::new())),
            mounts: Arc::new(AtomicUsize::new(0)),
            kills: Arc::new(AtomicUsize::new(0)),
        };
        let probe = Probe {
            spawned: runtime.spawned.clone(),
            files: runtime.files.clone(),
            mounts: runtime.mounts.clone(),
            kills: runtime.kills.clone(),
        };
        (Box::new(runtime), probe)
    }

    #[async_trait]
    impl SandboxRuntime for ScriptedRuntime {
        fn kind(&self) -> RuntimeKind {
            self.script.kind
        }

        fn name(&self) -> &str {
            "scripted"
        }

        async fn check_support(&self) -> Result<()> {
            if self.script.supported {
                Ok(())
            } else {
                Err(ForgeError::RuntimeUnsupported(
                    "cross-origin isolation is not enabled".to_string(),
                ))
            }
        }

        async fn clear(&self) -> Result<()> {
            self.files.lock().unwrap().clear();
            Ok(())
        }

        // Additive, so anything left over shows up in `Probe::files`
        async fn mount(&self, tree: &MountTree) -> Result<()> {
            self.mounts.fetch_add(1, Ordering::SeqCst);
            collect_files("", tree, &mut self.files.lock().unwrap());
            Ok(())
        }

        async fn spawn(&self, command: &str, args: &[String]) -> Result<SandboxProcess> {
            let line = format!("{} {}", command, args.join(" "));
            self.spawned.lock().unwrap().push(line);

            let (pipe, process) = SandboxProcess::pipe();
            let script = self.script.clone();
            let ready = self.ready.clone();
            let kills = self.kills.clone();
            let is_install = args.first().map(|a| a == "install").unwrap_or(false);

            tokio::spawn(async move {
                if is_install {
                    let _ = pipe.output.send("added 42 packages".to_string()).await;
                    drop(pipe.output);
                    let _ = pipe.exit.send(script.install_exit);
                    return;
                }

                let _ = pipe.output.send("VITE v5 dev server".to_string()).await;
                if let Some(code) = script.dev_exit {
                    let _ = pipe.exit.send(code);
                    return;
                }
                if script.announce_ready {
                    let _ = ready.send(ServerReady {
                        port: 5173,
                        url: "http://localhost:5173".to_string(),
                    });
                }
                if pipe.kill.await.is_ok() {
                    kills.fetch_add(1, Ordering::SeqCst);
                }
                let _ = pipe.exit.send(143);
            });

            Ok(process)
        }

        fn subscribe_ready(&self) -> broadcast::Receiver<ServerReady> {
            self.ready.subscribe()
        }

        async fn teardown(&self) -> Result<()> {
            Ok(())
        }
    }

    fn project() -> FileTree {
        let mut tree = FileTree::new();
        tree.insert("package.json", r#"{"name":"demo"}"#);
        tree.insert("src/App.tsx", "export default function App() {}");
        tree
    }

    fn orchestrator(script: Script) -> (Orchestrator, Probe) {
        let (runtime, probe) = scripted(script);
        let options = OrchestratorOptions {
            ready_timeout: Duration::from_secs(5),
            ..OrchestratorOptions::default()
        };
        (Orchestrator::new(runtime, options), probe)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_session_reaches_ready() {
        let (mut orchestrator, probe) = orchestrator(Script::native());
        let snapshot = orchestrator.start(project()).await;

        assert!(snapshot.is_ready());
        assert_eq!(snapshot.preview_endpoint.as_deref(), Some("http://localhost:5173"));
        assert_eq!(
            snapshot.history,
            vec![
                SessionStatus::Mounting,
                SessionStatus::InstallingDependencies,
                SessionStatus::StartingServer,
                SessionStatus::Ready
            ]
        );
        assert!(!snapshot.install_skipped);
        assert!(snapshot.log_lines.iter().any(|l| l == "added 42 packages"));
        assert_eq!(probe.spawned(), vec!["npm install", "npm run dev"]);
        assert!(orchestrator.has_live_process());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_runtime_fails_at_mounting() {
        let script = Script {
            supported: false,
            ..Script::native()
        };
        let (mut orchestrator, probe) = orchestrator(script);
        let snapshot = orchestrator.start(project()).await;

        assert!(snapshot.is_failed());
        assert_eq!(snapshot.history, vec![SessionStatus::Mounting, SessionStatus::Failed]);
        assert_eq!(snapshot.preview_endpoint, None);
        let detail = snapshot.error_detail.unwrap();
        assert!(detail.contains("Download the project files"));
        assert_eq!(probe.mounts.load(Ordering::SeqCst), 0);
        assert!(probe.spawned().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_timeout_yields_placeholder() {
        let script = Script {
            kind: RuntimeKind::Simulated,
            announce_ready: false,
            ..Script::native()
        };
        let (mut orchestrator, _probe) = orchestrator(script);
        let snapshot = orchestrator.start(project()).await;

        assert!(snapshot.is_ready());
        let endpoint = snapshot.preview_endpoint.unwrap();
        assert!(endpoint.starts_with("data:text/html;base64,"));
        let document = STANDARD
            .decode(endpoint.trim_start_matches("data:text/html;base64,"))
            .unwrap();
        let document = String::from_utf8(document).unwrap();
        assert!(document.contains("src/App.tsx"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_native_timeout_fails() {
        let script = Script {
            announce_ready: false,
            ..Script::native()
        };
        let (mut orchestrator, probe) = orchestrator(script);
        let snapshot = orchestrator.start(project()).await;

        assert!(snapshot.is_failed());
        assert!(snapshot.error_detail.unwrap().contains("did not report ready"));
        assert!(!orchestrator.has_live_process());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(probe.kills.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_install_failure_surfaces_log_tail() {
        let script = Script {
            install_exit: 1,
            ..Script::native()
        };
        let (mut orchestrator, probe) = orchestrator(script);
        let snapshot = orchestrator.start(project()).await;

        assert!(snapshot.is_failed());
        assert_eq!(snapshot.status, SessionStatus::Failed);
        let detail = snapshot.error_detail.unwrap();
        assert!(detail.contains("exited with code 1"));
        assert!(detail.contains("added 42 packages"));
        assert_eq!(probe.spawned(), vec!["npm install"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dev_server_crash_fails() {
        let script = Script {
            dev_exit: Some(1),
            ..Script::native()
        };
        let (mut orchestrator, _probe) = orchestrator(script);
        let snapshot = orchestrator.start(project()).await;
        assert!(snapshot.is_failed());
        assert!(snapshot.error_detail.unwrap().contains("exited before it was ready"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflicting_paths_fail_mounting() {
        let (mut orchestrator, probe) = orchestrator(Script::native());
        let mut tree = project();
        tree.insert("src", "not a directory");
        let snapshot = orchestrator.start(tree).await;

        assert!(snapshot.is_failed());
        assert!(snapshot.error_detail.unwrap().contains("src"));
        assert_eq!(probe.mounts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_skips_install_when_manifest_unchanged() {
        let (mut orchestrator, probe) = orchestrator(Script::native());
        orchestrator.start(project()).await;

        let mut edited = project();
        edited.insert("src/App.tsx", "export default function App() { return null }");
        let snapshot = orchestrator.refresh(edited).await;

        assert!(snapshot.is_ready());
        assert!(snapshot.install_skipped);
        assert_eq!(snapshot.generation, 2);
        assert!(!snapshot.history.contains(&SessionStatus::InstallingDependencies));
        assert_eq!(
            probe.spawned(),
            vec!["npm install", "npm run dev", "npm run dev"]
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(probe.kills.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_with_new_manifest_reinstalls() {
        let (mut orchestrator, probe) = orchestrator(Script::native());
        orchestrator.start(project()).await;

        let mut edited = project();
        edited.insert("package.json", r#"{"name":"demo","dependencies":{"zod":"latest"}}"#);
        let snapshot = orchestrator.refresh(edited).await;

        assert!(!snapshot.install_skipped);
        assert!(snapshot.history.contains(&SessionStatus::InstallingDependencies));
        assert_eq!(probe.spawned().iter().filter(|c| *c == "npm install").count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_after_failed_install_is_fresh() {
        let script = Script {
            install_exit: 1,
            ..Script::native()
        };
        let (mut orchestrator, _probe) = orchestrator(script);
        orchestrator.start(project()).await;
        let snapshot = orchestrator.refresh(project()).await;
        assert!(snapshot.history.contains(&SessionStatus::InstallingDependencies));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_start_drops_previous_files() {
        let (mut orchestrator, probe) = orchestrator(Script::native());
        let mut first = project();
        first.insert("src/old.ts", "export const old = 1");
        orchestrator.start(first).await;
        assert!(probe.files().contains(&"src/old.ts".to_string()));

        let snapshot = orchestrator.start(project()).await;
        assert!(snapshot.is_ready());
        assert_eq!(probe.files(), vec!["package.json", "src/App.tsx"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_runs_full_session() {
        let (mut orchestrator, probe) = orchestrator(Script::native());
        assert!(orchestrator.restart().await.is_err());

        orchestrator.start(project()).await;
        let snapshot = orchestrator.restart().await.unwrap();
        assert!(snapshot.is_ready());
        assert_eq!(snapshot.generation, 2);
        assert_eq!(snapshot.history[1], SessionStatus::InstallingDependencies);
        assert_eq!(probe.mounts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_transitions() {
        let (mut orchestrator, _probe) = orchestrator(Script::native());
        let updates = orchestrator.subscribe();
        orchestrator.start(project()).await;
        assert_eq!(updates.borrow().status, SessionStatus::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_buffer_is_bounded() {
        let (runtime, _probe) = scripted(Script::native());
        let options = OrchestratorOptions {
            log_capacity: 2,
            ..OrchestratorOptions::default()
        };
        let mut orchestrator = Orchestrator::new(runtime, options);
        let snapshot = orchestrator.start(project()).await;
        assert!(snapshot.log_lines.len() <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_stops_dev_server() {
        let (mut orchestrator, probe) = orchestrator(Script::native());
        orchestrator.start(project()).await;
        orchestrator.dispose().await;
        assert!(!orchestrator.has_live_process());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(probe.kills.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exec_returns_exit_code() {
        let (mut orchestrator, _probe) = orchestrator(Script {
            install_exit: 7,
            ..Script::native()
        });
        let code = orchestrator.exec("npm", &["install".to_string()]).await.unwrap();
        assert_eq!(code, 7);
        assert!(orchestrator.snapshot().log_lines.contains(&"added 42 packages".to_string()));
    }
}
