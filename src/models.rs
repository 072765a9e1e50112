use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One file or directory in the imported repository tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileTreeNode {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// File nodes only; `None` until the enricher has fetched it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Folder nodes only, ordered, sibling-unique by name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileTreeNode>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

impl FileTreeNode {
    pub fn file(name: impl Into<String>, path: impl Into<String>, content: Option<String>) -> Self {
        FileTreeNode {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::File,
            content,
            children: None,
        }
    }

    pub fn folder(name: impl Into<String>, path: impl Into<String>) -> Self {
        FileTreeNode {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::Folder,
            content: None,
            children: Some(Vec::new()),
        }
    }
}

/// One edit extracted from an LLM response, pending user approval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProposedChange {
    #[serde(rename = "filePath")]
    pub file_path: String,
    pub action: ChangeAction,
    #[serde(rename = "newContent")]
    pub new_content: String,
    pub applied: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Modify,
    /// Part of the type model, never produced by the parser.
    Delete,
}

/// One transcript entry in a chat session.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: u64,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "codeChanges", skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<ProposedChange>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A flat entry as listed by the repository content source.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    /// Submodule pointers and anything else the listing may carry.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoInfo {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

// Request bodies.

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(rename = "currentFile")]
    pub current_file: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    #[serde(rename = "messageId")]
    pub message_id: u64,
    #[serde(rename = "changeIndex")]
    pub change_index: usize,
}

#[derive(Debug, Deserialize)]
pub struct PushRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub cwd: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub path: Option<String>,
}
