//! Sandbox session state and its bounded log buffer

use forge_types::{SessionSnapshot, SessionStatus};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Ring buffer keeping the most recent log lines
#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    /// Retained lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    /// Last `n` retained lines joined with newlines
    pub fn tail(&self, n: usize) -> String {
        let skip = self.lines.len().saturating_sub(n);
        self.lines
            .iter()
            .skip(skip)
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Shared log destination for output-forwarding tasks.
///
/// Lines land in the bounded buffer and are re-broadcast to live
/// subscribers.
#[derive(Debug)]
pub struct LogSink {
    buffer: Mutex<LogBuffer>,
    live: broadcast::Sender<String>,
}

impl LogSink {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (live, _) = broadcast::channel(capacity.max(16));
        Arc::new(Self {
            buffer: Mutex::new(LogBuffer::new(capacity)),
            live,
        })
    }

    pub fn push(&self, line: impl Into<String>) {
        let line = line.into();
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push(line.clone());
        }
        // No subscribers is fine
        let _ = self.live.send(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.buffer.lock().map(|b| b.lines()).unwrap_or_default()
    }

    pub fn tail(&self, n: usize) -> String {
        self.buffer.lock().map(|b| b.tail(n)).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.clear();
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.live.subscribe()
    }
}

/// One sandbox session. Only the orchestrator mutates it.
#[derive(Debug, Clone)]
pub struct SandboxSession {
    generation: u64,
    status: SessionStatus,
    preview_endpoint: Option<String>,
    error_detail: Option<String>,
    install_skipped: bool,
    history: Vec<SessionStatus>,
}

impl SandboxSession {
    /// Fresh session in `Mounting`
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            status: SessionStatus::Mounting,
            preview_endpoint: None,
            error_detail: None,
            install_skipped: false,
            history: vec![SessionStatus::Mounting],
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn preview_endpoint(&self) -> Option<&str> {
        self.preview_endpoint.as_deref()
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    pub fn history(&self) -> &[SessionStatus] {
        &self.history
    }

    /// Move forward to `next`. Backward or post-terminal moves are refused.
    pub fn advance(&mut self, next: SessionStatus) -> bool {
        if !self.status.can_advance_to(next) {
            warn!(
                "Refusing session transition {} -> {} (generation {})",
                self.status, next, self.generation
            );
            return false;
        }
        info!("Session {}: {} -> {}", self.generation, self.status, next);
        self.status = next;
        self.history.push(next);
        true
    }

    /// Skip dependency installation for a file-only refresh
    pub fn skip_install(&mut self) -> bool {
        self.install_skipped = true;
        self.advance(SessionStatus::StartingServer)
    }

    pub fn fail(&mut self, detail: impl Into<String>) -> bool {
        let detail = detail.into();
        if !self.advance(SessionStatus::Failed) {
            return false;
        }
        warn!("Session {} failed: {}", self.generation, detail);
        self.error_detail = Some(detail);
        true
    }

    pub fn ready(&mut self, endpoint: impl Into<String>) -> bool {
        if !self.advance(SessionStatus::Ready) {
            return false;
        }
        self.preview_endpoint = Some(endpoint.into());
        true
    }

    pub fn snapshot(&self, log_lines: Vec<String>) -> SessionSnapshot {
        SessionSnapshot {
            generation: self.generation,
            status: self.status,
            log_lines,
            preview_endpoint: self.preview_endpoint.clone(),
            error_detail: self.error_detail.clone(),
            install_skipped: self.install_skipped,
            history: self.history.clone(),
        }
    }
}
