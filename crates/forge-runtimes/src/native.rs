//! Native runtime: a scratch directory on disk and real child processes

use async_trait::async_trait;
use forge_core::sandbox::{ProcessPipe, RuntimeKind, SandboxProcess, SandboxRuntime};
use forge_core::{ForgeError, Result};
use forge_types::{MountNode, MountTree, ServerReady};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Binaries a Node project needs
const REQUIRED_BINARIES: &[&str] = &["node", "npm"];

/// Installed dependencies survive between sessions in a scratch directory
const KEPT_DIR: &str = "node_modules";

static LOCAL_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)https?://(localhost|127\.0\.0\.1|0\.0\.0\.0|\[::1\]):(\d{2,5})")
        .expect("valid local url regex")
});

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b(\[[0-9;?]*[A-Za-z])?").expect("valid ansi escape regex"));

/// Runs projects with the machine's Node toolchain
pub struct NodeRuntime {
    workdir: PathBuf,
    /// Scratch directories are removed on teardown; user directories are not
    owns_workdir: bool,
    ready: broadcast::Sender<ServerReady>,
}

impl NodeRuntime {
    /// Runtime with a fresh scratch directory under `root` (system temp dir
    /// when `None`)
    pub fn new(root: Option<&Path>) -> Self {
        let root = root
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        let workdir = root.join(format!("forge-{}", uuid::Uuid::new_v4()));
        Self::with_workdir(workdir, true)
    }

    /// Runtime operating directly in an existing project directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self::with_workdir(dir.into(), false)
    }

    fn with_workdir(workdir: PathBuf, owns_workdir: bool) -> Self {
        let (ready, _) = broadcast::channel(8);
        Self {
            workdir,
            owns_workdir,
            ready,
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Remove scratch entries that the new tree no longer has, or that
    /// changed between file and directory
    async fn prune_stale(&self, tree: &MountTree) -> Result<usize> {
        let mut pending: Vec<(PathBuf, &MountTree, bool)> = vec![(self.workdir.clone(), tree, true)];
        let mut removed = 0usize;

        while let Some((dir, level, is_root)) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                if is_root && name == KEPT_DIR {
                    continue;
                }
                let file_type = entry.file_type().await?;
                let keep = match name.to_str().and_then(|n| level.get(n)) {
                    Some(MountNode::Directory(children)) if file_type.is_dir() => {
                        pending.push((entry.path(), children, false));
                        true
                    }
                    Some(MountNode::File { .. }) => file_type.is_file(),
                    _ => false,
                };
                if !keep {
                    remove_entry(&entry.path()).await?;
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}

/// Path of a mount entry inside `dir`. Names must be a single plain
/// component so nothing is written outside the workdir.
fn entry_path(dir: &Path, name: &str) -> Result<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(dir.join(name)),
        _ => Err(ForgeError::Mount(format!("refusing to mount entry `{}`", name))),
    }
}

async fn remove_entry(path: &Path) -> Result<()> {
    let metadata = tokio::fs::symlink_metadata(path).await?;
    if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await?;
    } else {
        tokio::fs::remove_file(path).await?;
    }
    Ok(())
}

#[async_trait]
impl SandboxRuntime for NodeRuntime {
    fn kind(&self) -> RuntimeKind {
        RuntimeKind::Native
    }

    fn name(&self) -> &str {
        "node"
    }

    async fn check_support(&self) -> Result<()> {
        for binary in REQUIRED_BINARIES {
            if which::which(binary).is_err() {
                return Err(ForgeError::RuntimeUnsupported(format!(
                    "`{}` was not found on PATH",
                    binary
                )));
            }
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        if !self.owns_workdir {
            return Ok(());
        }
        let mut entries = match tokio::fs::read_dir(&self.workdir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name() == KEPT_DIR {
                continue;
            }
            remove_entry(&entry.path()).await?;
            removed += 1;
        }
        debug!("Cleared {} entries from {}", removed, self.workdir.display());
        Ok(())
    }

    async fn mount(&self, tree: &MountTree) -> Result<()> {
        if self.owns_workdir {
            let removed = self
                .prune_stale(tree)
                .await
                .map_err(|e| ForgeError::Mount(format!("{}: {}", self.workdir.display(), e)))?;
            if removed > 0 {
                debug!("Removed {} stale entries from {}", removed, self.workdir.display());
            }
        }

        let mut pending: Vec<(PathBuf, &MountTree)> = vec![(self.workdir.clone(), tree)];
        let mut files = 0usize;

        while let Some((dir, level)) = pending.pop() {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| ForgeError::Mount(format!("{}: {}", dir.display(), e)))?;
            for (name, node) in level {
                let path = entry_path(&dir, name)?;
                match node {
                    MountNode::File { contents } => {
                        tokio::fs::write(&path, contents)
                            .await
                            .map_err(|e| ForgeError::Mount(format!("{}: {}", path.display(), e)))?;
                        files += 1;
                    }
                    MountNode::Directory(children) => pending.push((path, children)),
                }
            }
        }

        debug!("Mounted {} files into {}", files, self.workdir.display());
        Ok(())
    }

    async fn spawn(&self, command: &str, args: &[String]) -> Result<SandboxProcess> {
        // npm is npm.cmd on Windows; which resolves the right file
        let program = which::which(command)
            .map(|p| p.into_os_string())
            .unwrap_or_else(|_| command.into());

        let mut child = Command::new(&program)
            .args(args)
            .current_dir(&self.workdir)
            .env("FORCE_COLOR", "0")
            .env("BROWSER", "none")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ForgeError::Process(format!("Failed to start {}: {}", command, e)))?;

        info!("Spawned `{} {}` in {}", command, args.join(" "), self.workdir.display());

        let (pipe, process) = SandboxProcess::pipe();
        let ProcessPipe { output, exit, kill } = pipe;

        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(read_lines(
                stdout,
                output.clone(),
                Some(self.ready.clone()),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(read_lines(stderr, output.clone(), None)));
        }
        drop(output);

        let label = command.to_string();
        tokio::spawn(async move {
            let (status, killed) = tokio::select! {
                status = child.wait() => (status, false),
                // Explicit kill or a dropped handle
                _ = kill => {
                    debug!("Terminating {}", label);
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill {}: {}", label, e);
                    }
                    (child.wait().await, true)
                }
            };

            // Grandchildren may keep the pipes open after a kill
            for reader in readers {
                if killed {
                    reader.abort();
                } else {
                    let _ = reader.await;
                }
            }

            let code = match status {
                Ok(status) => status.code().unwrap_or(-1),
                Err(e) => {
                    warn!("Failed to wait for {}: {}", label, e);
                    -1
                }
            };
            debug!("{} exited with code {}", label, code);
            let _ = exit.send(code);
        });

        Ok(process)
    }

    fn subscribe_ready(&self) -> broadcast::Receiver<ServerReady> {
        self.ready.subscribe()
    }

    async fn teardown(&self) -> Result<()> {
        if !self.owns_workdir {
            return Ok(());
        }
        match tokio::fs::remove_dir_all(&self.workdir).await {
            Ok(()) => {
                debug!("Removed scratch directory {}", self.workdir.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Forward a stream line by line, announcing the first local server URL
async fn read_lines<R>(
    stream: R,
    output: mpsc::Sender<String>,
    ready: Option<broadcast::Sender<ServerReady>>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut announced = false;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Stopped reading process output: {}", e);
                break;
            }
        }
        // Tools print arbitrary bytes; one bad sequence must not end the stream
        let raw_line = String::from_utf8_lossy(&buf);
        let line = strip_ansi(raw_line.trim_end_matches(|c: char| c == '\n' || c == '\r'));
        if !announced {
            if let (Some(ready), Some(event)) = (&ready, detect_server_ready(&line)) {
                announced = true;
                info!("Dev server listening at {}", event.url);
                let _ = ready.send(event);
            }
        }
        // Keep draining after the consumer is gone so the child never blocks
        let _ = output.send(line).await;
    }
}

/// Find a local server URL such as `http://localhost:5173/` in a log line
pub fn detect_server_ready(line: &str) -> Option<ServerReady> {
    let caps = LOCAL_URL.captures(line)?;
    let port: u16 = caps.get(2)?.as_str().parse().ok()?;
    let host = match caps.get(1)?.as_str() {
        "0.0.0.0" => "localhost",
        other => other,
    };
    let scheme = if caps.get(0)?.as_str().to_lowercase().starts_with("https") {
        "https"
    } else {
        "http"
    };
    Some(ServerReady {
        port,
        url: format!("{}://{}:{}", scheme, host, port),
    })
}

/// Strip ANSI escape sequences (e.g. `\x1b[32m`) from a string
pub fn strip_ansi(s: &str) -> String {
    ANSI_ESCAPE.replace_all(s, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[32m➜\x1b[39m  Local: ok"), "➜  Local: ok");
        assert_eq!(strip_ansi("plain"), "plain");
        assert_eq!(strip_ansi("\x1b[2K\x1b[1G  ready"), "  ready");
        // A lone escape goes, the character after it stays
        assert_eq!(strip_ansi("\x1b7saved"), "7saved");
    }

    #[test]
    fn test_detect_server_ready() {
        let vite = detect_server_ready("  ➜  Local:   http://localhost:5173/").unwrap();
        assert_eq!(vite.port, 5173);
        assert_eq!(vite.url, "http://localhost:5173");

        let next = detect_server_ready("- Local: http://0.0.0.0:3000").unwrap();
        assert_eq!(next.url, "http://localhost:3000");

        assert!(detect_server_ready("added 120 packages in 4s").is_none());
        assert!(detect_server_ready("see https://vitejs.dev/config").is_none());
    }

    #[tokio::test]
    async fn test_mount_and_teardown() {
        let root = tempfile::tempdir().unwrap();
        let runtime = NodeRuntime::new(Some(root.path()));

        let mut src = MountTree::new();
        src.insert(
            "main.ts".to_string(),
            MountNode::File {
                contents: "console.log(1)".to_string(),
            },
        );
        let mut tree = MountTree::new();
        tree.insert("src".to_string(), MountNode::Directory(src));
        tree.insert(
            "package.json".to_string(),
            MountNode::File {
                contents: "{}".to_string(),
            },
        );

        runtime.mount(&tree).await.unwrap();
        let main = std::fs::read_to_string(runtime.workdir().join("src/main.ts")).unwrap();
        assert_eq!(main, "console.log(1)");

        runtime.teardown().await.unwrap();
        assert!(!runtime.workdir().exists());
    }

    fn file(contents: &str) -> MountNode {
        MountNode::File {
            contents: contents.to_string(),
        }
    }

    #[tokio::test]
    async fn test_mount_refuses_parent_entries() {
        let root = tempfile::tempdir().unwrap();
        let runtime = NodeRuntime::new(Some(root.path()));

        let mut escaped = MountTree::new();
        escaped.insert("escaped.txt".to_string(), file("pwned"));
        let mut tree = MountTree::new();
        tree.insert("..".to_string(), MountNode::Directory(escaped));

        let err = runtime.mount(&tree).await.unwrap_err();
        assert!(matches!(err, ForgeError::Mount(_)));
        assert!(!root.path().join("escaped.txt").exists());

        let mut nested = MountTree::new();
        nested.insert("a/b.txt".to_string(), file("x"));
        assert!(runtime.mount(&nested).await.is_err());
    }

    #[tokio::test]
    async fn test_mount_prunes_files_missing_from_new_tree() {
        let root = tempfile::tempdir().unwrap();
        let runtime = NodeRuntime::new(Some(root.path()));

        let mut src = MountTree::new();
        src.insert("old.ts".to_string(), file("old"));
        src.insert("keep.ts".to_string(), file("keep"));
        let mut first = MountTree::new();
        first.insert("src".to_string(), MountNode::Directory(src));
        first.insert("lib".to_string(), file("was a file"));
        runtime.mount(&first).await.unwrap();

        let modules = runtime.workdir().join("node_modules/react");
        std::fs::create_dir_all(&modules).unwrap();
        std::fs::write(modules.join("index.js"), "x").unwrap();

        let mut src = MountTree::new();
        src.insert("keep.ts".to_string(), file("kept"));
        let mut lib = MountTree::new();
        lib.insert("util.ts".to_string(), file("util"));
        let mut second = MountTree::new();
        second.insert("src".to_string(), MountNode::Directory(src));
        second.insert("lib".to_string(), MountNode::Directory(lib));
        runtime.mount(&second).await.unwrap();

        let workdir = runtime.workdir();
        assert!(!workdir.join("src/old.ts").exists());
        assert_eq!(std::fs::read_to_string(workdir.join("src/keep.ts")).unwrap(), "kept");
        assert!(workdir.join("lib/util.ts").is_file());
        assert!(modules.join("index.js").exists());

        runtime.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_keeps_only_dependencies() {
        let root = tempfile::tempdir().unwrap();
        let runtime = NodeRuntime::new(Some(root.path()));
        runtime.clear().await.unwrap();

        let mut tree = MountTree::new();
        tree.insert("package.json".to_string(), file("{}"));
        runtime.mount(&tree).await.unwrap();
        std::fs::create_dir_all(runtime.workdir().join("node_modules")).unwrap();

        runtime.clear().await.unwrap();
        assert!(!runtime.workdir().join("package.json").exists());
        assert!(runtime.workdir().join("node_modules").is_dir());
    }

    #[tokio::test]
    async fn test_user_dir_is_never_cleared() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "mine").unwrap();
        let runtime = NodeRuntime::in_dir(dir.path());

        runtime.clear().await.unwrap();
        runtime.mount(&MountTree::new()).await.unwrap();
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_user_dir_survives_teardown() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = NodeRuntime::in_dir(dir.path());
        runtime.teardown().await.unwrap();
        assert!(dir.path().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_streams_output_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = NodeRuntime::in_dir(dir.path());
        let args = vec!["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()];
        let process = runtime.spawn("sh", &args).await.unwrap();
        let (mut output, mut control) = process.into_parts();

        let mut lines = Vec::new();
        while let Some(line) = output.recv().await {
            lines.push(line);
        }
        lines.sort();
        assert_eq!(lines, vec!["err", "out"]);
        assert_eq!(control.wait().await, Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invalid_utf8_does_not_end_output() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = NodeRuntime::in_dir(dir.path());
        let mut ready = runtime.subscribe_ready();
        let args = vec![
            "-c".to_string(),
            r"printf 'a\n\377\nafter http://localhost:5173/\n'".to_string(),
        ];
        let process = runtime.spawn("sh", &args).await.unwrap();
        let (mut output, mut control) = process.into_parts();

        let mut lines = Vec::new();
        while let Some(line) = output.recv().await {
            lines.push(line);
        }
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "a");
        assert_eq!(lines[1], "\u{FFFD}");
        assert!(lines[2].starts_with("after"));
        assert_eq!(control.wait().await, Some(0));
        assert_eq!(ready.try_recv().unwrap().port, 5173);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ready_announcement_and_kill() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = NodeRuntime::in_dir(dir.path());
        let mut ready = runtime.subscribe_ready();

        let args = vec![
            "-c".to_string(),
            "echo 'Local: http://localhost:4321/'; exec sleep 30".to_string(),
        ];
        let process = runtime.spawn("sh", &args).await.unwrap();
        let (_output, mut control) = process.into_parts();

        let event = tokio::time::timeout(Duration::from_secs(5), ready.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.port, 4321);

        assert!(control.kill());
        let code = tokio::time::timeout(Duration::from_secs(5), control.wait())
            .await
            .unwrap();
        assert!(code.is_some());
    }
}
