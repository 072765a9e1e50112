use crate::changes::parse_changes;
use crate::error::ApiError;
use crate::github::GitHubClient;
use crate::llm::{build_file_context, ChatBackend};
use crate::models::{ChatMessage, FileTreeNode, MessageRole, ProposedChange, RepoInfo};
use crate::tree::{apply_change, MissingParentPolicy};
use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// The imported repository and its chat transcript. Replaced wholesale on a
/// new import.
#[derive(Default)]
pub struct Workspace {
    pub repo: Option<RepoInfo>,
    pub files: Vec<FileTreeNode>,
    pub messages: Vec<ChatMessage>,
    next_id: u64,
}

impl Workspace {
    pub fn install_import(&mut self, repo: RepoInfo, files: Vec<FileTreeNode>) {
        info!("Workspace now holds {}/{}@{}", repo.owner, repo.repo, repo.branch);
        self.repo = Some(repo);
        self.files = files;
        self.messages.clear();
    }

    pub fn append_message(
        &mut self,
        role: MessageRole,
        content: String,
        changes: Vec<ProposedChange>,
    ) -> ChatMessage {
        self.next_id += 1;
        let message = ChatMessage {
            id: self.next_id,
            role,
            content,
            timestamp: Utc::now(),
            changes,
        };
        self.messages.push(message.clone());
        message
    }

    /// Accepts one proposed change: flips its `applied` flag (exactly once)
    /// and folds the edit into the tree. Re-accepting an already-applied
    /// change is a no-op.
    pub fn accept_change(
        &mut self,
        message_id: u64,
        change_index: usize,
    ) -> Result<ProposedChange, ApiError> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| ApiError::NotFound(format!("no message with id {}", message_id)))?;
        let change = message.changes.get_mut(change_index).ok_or_else(|| {
            ApiError::NotFound(format!(
                "message {} has no change at index {}",
                message_id, change_index
            ))
        })?;

        if change.applied {
            return Ok(change.clone());
        }
        change.applied = true;
        let accepted = change.clone();

        self.files = apply_change(&self.files, &accepted, MissingParentPolicy::FlatInsert);
        info!("Applied {:?} change to '{}'", accepted.action, accepted.file_path);
        Ok(accepted)
    }
}

/// Shared application state. The turn lock makes "one chat turn in flight"
/// explicit instead of relying on the frontend disabling its send button.
pub struct AppState {
    pub github: GitHubClient,
    pub chat: Arc<dyn ChatBackend>,
    pub workspace: RwLock<Workspace>,
    turn_lock: Mutex<()>,
}

impl AppState {
    pub fn new(github: GitHubClient, chat: Arc<dyn ChatBackend>) -> Self {
        AppState {
            github,
            chat,
            workspace: RwLock::new(Workspace::default()),
            turn_lock: Mutex::new(()),
        }
    }
}

/// One orchestrator turn: Idle -> Sending -> (Success | Failed) -> Idle.
/// A concurrent turn is rejected up front. On failure an error-flavored
/// assistant message lands in the transcript and no changes are produced;
/// there is no automatic retry.
pub async fn run_turn(
    state: &AppState,
    user_message: &str,
    current_file: Option<&str>,
) -> Result<ChatMessage, ApiError> {
    let _turn = state
        .turn_lock
        .try_lock()
        .map_err(|_| ApiError::TurnInFlight)?;

    // Sending: record the user message and snapshot the context while
    // holding the lock briefly, then call out without it.
    let context = {
        let mut ws = state.workspace.write().await;
        ws.append_message(MessageRole::User, user_message.to_string(), Vec::new());
        build_file_context(&ws.files, current_file)
    };

    match state.chat.complete(user_message, &context).await {
        Ok(reply) => {
            let changes = parse_changes(&reply);
            info!("Turn succeeded with {} proposed change(s)", changes.len());
            let mut ws = state.workspace.write().await;
            Ok(ws.append_message(MessageRole::Assistant, reply, changes))
        }
        Err(e) => {
            warn!("Turn failed: {}", e);
            let mut ws = state.workspace.write().await;
            Ok(ws.append_message(
                MessageRole::Assistant,
                format!("Sorry, I encountered an error: {}. Please try again.", e),
                Vec::new(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChangeAction, EntryKind, RepoEntry};
    use crate::tree::{build_tree, find_node};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct CannedBackend(Result<String, String>);

    #[async_trait]
    impl ChatBackend for CannedBackend {
        async fn complete(&self, _msg: &str, _ctx: &str) -> Result<String, ApiError> {
            self.0
                .clone()
                .map_err(ApiError::Upstream)
        }
    }

    fn state_with_reply(reply: Result<String, String>) -> AppState {
        AppState::new(GitHubClient::new(None), Arc::new(CannedBackend(reply)))
    }

    #[tokio::test]
    async fn successful_turn_appends_reply_with_parsed_changes() {
        let state = state_with_reply(Ok(
            "Done.\n```\n// FILE: b.txt\nnew body\n```\n".to_string()
        ));
        {
            let mut ws = state.workspace.write().await;
            let mut files = build_tree(&[RepoEntry {
                path: "b.txt".into(),
                kind: EntryKind::Blob,
                size: Some(5),
            }]);
            files[0].content = Some("old".to_string());
            ws.install_import(
                RepoInfo {
                    owner: "o".into(),
                    repo: "r".into(),
                    branch: "main".into(),
                },
                files,
            );
        }

        let reply = run_turn(&state, "change b", Some("b.txt")).await.unwrap();

        assert_eq!(reply.role, MessageRole::Assistant);
        assert_eq!(reply.changes.len(), 1);
        assert_eq!(reply.changes[0].file_path, "b.txt");
        assert_eq!(reply.changes[0].action, ChangeAction::Modify);
        assert!(!reply.changes[0].applied);

        let ws = state.workspace.read().await;
        assert_eq!(ws.messages.len(), 2);
        assert_eq!(ws.messages[0].role, MessageRole::User);
        // Nothing is applied until the user accepts.
        assert_eq!(
            find_node(&ws.files, "b.txt").unwrap().content.as_deref(),
            Some("old")
        );
    }

    #[tokio::test]
    async fn failed_turn_appends_error_message_without_changes() {
        let state = state_with_reply(Err("LLM API error: 503".to_string()));

        let reply = run_turn(&state, "hello", None).await.unwrap();

        assert_eq!(reply.role, MessageRole::Assistant);
        assert!(reply.content.contains("LLM API error: 503"));
        assert!(reply.changes.is_empty());
        let ws = state.workspace.read().await;
        assert_eq!(ws.messages.len(), 2);
    }

    #[tokio::test]
    async fn accepting_a_change_applies_it_exactly_once() {
        let state = state_with_reply(Ok(
            "```\n// CREATE: c.txt\nhello\n```\n".to_string()
        ));
        let reply = run_turn(&state, "make c.txt", None).await.unwrap();

        let mut ws = state.workspace.write().await;
        let accepted = ws.accept_change(reply.id, 0).unwrap();
        assert!(accepted.applied);
        assert_eq!(
            find_node(&ws.files, "c.txt").unwrap().content.as_deref(),
            Some("hello")
        );

        let files_before = ws.files.clone();
        // Second acceptance is a no-op.
        ws.accept_change(reply.id, 0).unwrap();
        assert_eq!(ws.files, files_before);
    }

    #[tokio::test]
    async fn accepting_unknown_change_is_not_found() {
        let state = state_with_reply(Ok("no blocks here".to_string()));
        let reply = run_turn(&state, "hi", None).await.unwrap();
        assert!(reply.changes.is_empty());

        let mut ws = state.workspace.write().await;
        let err = ws.accept_change(reply.id, 0).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        let err = ws.accept_change(9999, 0).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
