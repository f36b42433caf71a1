//! Project directory watcher for live preview refresh

use crate::assembler::IGNORED_DIRS;
use crate::error::{ForgeError, Result};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind, Debouncer};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

/// Events emitted by the watcher
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Changed(PathBuf),
    Error(String),
}

/// Debounced recursive watcher over a project directory.
///
/// Changes inside dependency and build folders are dropped.
pub struct ProjectWatcher {
    root: PathBuf,
    rx: UnboundedReceiver<WatchEvent>,
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl ProjectWatcher {
    /// Start watching `root`
    pub fn watch(root: &Path, debounce: Duration) -> Result<Self> {
        let (tx, rx) = unbounded_channel();
        let filter_root = root.to_path_buf();

        let mut debouncer = new_debouncer(
            debounce,
            move |res: std::result::Result<
                Vec<notify_debouncer_mini::DebouncedEvent>,
                notify::Error,
            >| match res {
                Ok(events) => {
                    for event in events {
                        if event.kind != DebouncedEventKind::Any {
                            continue;
                        }
                        if is_ignored(&filter_root, &event.path) {
                            continue;
                        }
                        let _ = tx.send(WatchEvent::Changed(event.path));
                    }
                }
                Err(e) => {
                    let _ = tx.send(WatchEvent::Error(e.to_string()));
                }
            },
        )
        .map_err(|e| ForgeError::Watch(e.to_string()))?;

        debouncer
            .watcher()
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| ForgeError::Watch(e.to_string()))?;

        Ok(Self {
            root: root.to_path_buf(),
            rx,
            _debouncer: debouncer,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Wait for at least one change, then drain whatever else is queued.
    /// Returns `None` once the watcher has shut down.
    pub async fn next_batch(&mut self) -> Option<Result<Vec<PathBuf>>> {
        let mut changed = Vec::new();
        match self.rx.recv().await? {
            WatchEvent::Changed(path) => changed.push(path),
            WatchEvent::Error(e) => return Some(Err(ForgeError::Watch(e))),
        }
        while let Ok(event) = self.rx.try_recv() {
            if let WatchEvent::Changed(path) = event {
                if !changed.contains(&path) {
                    changed.push(path);
                }
            }
        }
        Some(Ok(changed))
    }
}

/// Whether a path lies inside a dependency or build folder under `root`
pub fn is_ignored(root: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().any(|c| match c {
        Component::Normal(name) => name
            .to_str()
            .map(|n| IGNORED_DIRS.contains(&n))
            .unwrap_or(false),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_ignored() {
        let root = Path::new("/work/app");
        assert!(is_ignored(root, Path::new("/work/app/node_modules/react/index.js")));
        assert!(is_ignored(root, Path::new("/work/app/.git/HEAD")));
        assert!(!is_ignored(root, Path::new("/work/app/src/App.tsx")));
        // Only components below the root count
        assert!(!is_ignored(Path::new("/dist/app"), Path::new("/dist/app/index.html")));
    }

    #[tokio::test]
    async fn test_watch_reports_changes() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = ProjectWatcher::watch(dir.path(), Duration::from_millis(50)).unwrap();
        assert_eq!(watcher.root(), dir.path());

        std::fs::write(dir.path().join("index.html"), "<p>hi</p>").unwrap();
        let batch = tokio::time::timeout(Duration::from_secs(5), watcher.next_batch())
            .await
            .expect("change reported in time");
        let paths = batch.unwrap().unwrap();
        assert!(paths.iter().any(|p| p.ends_with("index.html")));
    }
}
