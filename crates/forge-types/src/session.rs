//! Sandbox session state as seen by observers

use serde::{Deserialize, Serialize};

/// Lifecycle of one sandbox session.
///
/// Sessions only move forward: `Mounting` → `InstallingDependencies` →
/// `StartingServer` → `Ready`, or into `Failed` from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Mounting,
    InstallingDependencies,
    StartingServer,
    Ready,
    Failed,
}

impl SessionStatus {
    fn rank(&self) -> u8 {
        match self {
            SessionStatus::Mounting => 0,
            SessionStatus::InstallingDependencies => 1,
            SessionStatus::StartingServer => 2,
            SessionStatus::Ready | SessionStatus::Failed => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Ready | SessionStatus::Failed)
    }

    /// Whether a session in this state may move to `next`
    pub fn can_advance_to(&self, next: SessionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == SessionStatus::Failed {
            return true;
        }
        next.rank() > self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Mounting => "mounting",
            SessionStatus::InstallingDependencies => "installing_dependencies",
            SessionStatus::StartingServer => "starting_server",
            SessionStatus::Ready => "ready",
            SessionStatus::Failed => "failed",
        }
    }

    /// Short progress label for display
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Mounting => "Mounting project files",
            SessionStatus::InstallingDependencies => "Installing dependencies",
            SessionStatus::StartingServer => "Starting development server",
            SessionStatus::Ready => "Preview ready",
            SessionStatus::Failed => "Preview failed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time copy of a sandbox session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Monotonic session counter, bumped on every fresh session
    pub generation: u64,
    pub status: SessionStatus,
    /// Most recent log lines, oldest first
    pub log_lines: Vec<String>,
    pub preview_endpoint: Option<String>,
    pub error_detail: Option<String>,
    /// True when dependency installation was skipped for a file-only refresh
    #[serde(default)]
    pub install_skipped: bool,
    /// Every status this session has been in, in order
    #[serde(default)]
    pub history: Vec<SessionStatus>,
}

impl SessionSnapshot {
    pub fn is_ready(&self) -> bool {
        self.status == SessionStatus::Ready
    }

    pub fn is_failed(&self) -> bool {
        self.status == SessionStatus::Failed
    }
}

/// Announcement that a dev server is accepting connections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerReady {
    pub port: u16,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_only() {
        use SessionStatus::*;
        assert!(Mounting.can_advance_to(InstallingDependencies));
        assert!(Mounting.can_advance_to(StartingServer));
        assert!(InstallingDependencies.can_advance_to(Failed));
        assert!(!StartingServer.can_advance_to(Mounting));
        assert!(!Ready.can_advance_to(Mounting));
        assert!(!Failed.can_advance_to(Ready));
        assert!(!Mounting.can_advance_to(Mounting));
    }
}
