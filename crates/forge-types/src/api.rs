//! Request and response bodies exchanged with clients

use crate::file_tree::FileTree;
use crate::project::{Archetype, ProjectConfig};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Author of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn of conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Body of a chat (generation) request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// Result of one generation cycle.
///
/// The two shapes are discriminated by `kind` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ChatResponse {
    SingleFile {
        message: String,
        code: String,
        language: String,
        #[serde(default)]
        image_validation: Option<String>,
    },
    MultiFile {
        message: String,
        file_tree: FileTree,
        project_type: Archetype,
        project_config: ProjectConfig,
    },
}

impl ChatResponse {
    pub fn message(&self) -> &str {
        match self {
            ChatResponse::SingleFile { message, .. } | ChatResponse::MultiFile { message, .. } => {
                message
            }
        }
    }

    pub fn is_multi_file(&self) -> bool {
        matches!(self, ChatResponse::MultiFile { .. })
    }
}

/// Error body returned by the HTTP API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Request to publish a single-file document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub code: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishResponse {
    pub success: bool,
    pub id: String,
    pub url: String,
}

/// A stored, shareable document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedSite {
    pub id: String,
    pub code: String,
    pub title: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub views: u64,
}

/// Daily prompt allowance for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub limit: u32,
    pub used: u32,
    pub remaining: u32,
    pub last_reset: NaiveDate,
}
