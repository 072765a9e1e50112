use crate::error::ApiError;
use crate::models::FileTreeNode;
use crate::tree::collect_files;
use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;

/// Files included in the context when no active file narrows the selection.
const CONTEXT_FILE_LIMIT: usize = 10;

const SYSTEM_PROMPT: &str = "You are an expert software engineer assistant.\n\
Your task is to help modify, create, or explain code based on user instructions.\n\
\n\
IMPORTANT RULES:\n\
1. When creating a NEW file, use this format:\n\
   ```language\n\
   // CREATE: path/to/new/file.ext\n\
   <complete file content>\n\
   ```\n\
2. When modifying an EXISTING file, use this format:\n\
   ```language\n\
   // FILE: path/to/existing/file.ext\n\
   <complete file content>\n\
   ```\n\
3. Always explain what you're doing.\n\
4. If asked to create a whole app, provide all necessary files in the formats above.";

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

#[derive(Deserialize)]
struct UpstreamError {
    error: Option<UpstreamErrorDetail>,
}

#[derive(Deserialize)]
struct UpstreamErrorDetail {
    message: String,
}

/// The LLM collaborator seam. The orchestrator only needs "message plus
/// context in, free-text reply out".
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, user_message: &str, file_context: &str) -> Result<String, ApiError>;
}

impl LlmClient {
    pub fn new(api_url: String, api_key: String, model: String) -> Self {
        LlmClient {
            http: reqwest::Client::new(),
            api_url,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    /// One chat completion. No retries; a non-success response surfaces
    /// verbatim to the caller.
    async fn complete(&self, user_message: &str, file_context: &str) -> Result<String, ApiError> {
        let system = format!("{}\n\nCurrent project context:\n{}", SYSTEM_PROMPT, file_context);
        debug!(
            "Sending chat completion ({} context bytes) to {}",
            file_context.len(),
            self.api_url
        );
        let start_time = Instant::now();

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": user_message },
                ],
                "temperature": 0.7,
                "max_tokens": 4000,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<UpstreamError>()
                .await
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or_else(|| format!("LLM API error: {}", status));
            return Err(ApiError::Upstream(detail));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ApiError::upstream("malformed completion payload", e))?;
        let reply = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ApiError::Upstream("completion carried no choices".to_string()))?;

        info!("LLM reply received in {:.2?}", start_time.elapsed());
        Ok(reply)
    }
}

/// Flattens the forest into `=== path ===` context blocks. With an active
/// file, only that file's top-level directory group is sent; otherwise the
/// first files in traversal order, capped.
pub fn build_file_context(forest: &[FileTreeNode], active_file: Option<&str>) -> String {
    let flat = collect_files(forest);

    let relevant: Vec<&(String, String)> = match active_file {
        Some(active) => {
            let group = active.split('/').next().unwrap_or(active);
            flat.iter()
                .filter(|(path, _)| {
                    path.as_str() == active || path.split('/').next() == Some(group)
                })
                .collect()
        }
        None => flat.iter().take(CONTEXT_FILE_LIMIT).collect(),
    };

    relevant
        .iter()
        .map(|(path, content)| format!("=== {} ===\n{}", path, content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileTreeNode;
    use pretty_assertions::assert_eq;

    fn forest() -> Vec<FileTreeNode> {
        let mut src = FileTreeNode::folder("src", "src");
        src.children = Some(vec![
            FileTreeNode::file("main.rs", "src/main.rs", Some("fn main() {}".into())),
            FileTreeNode::file("lib.rs", "src/lib.rs", Some("pub mod x;".into())),
        ]);
        vec![
            src,
            FileTreeNode::file("README.md", "README.md", Some("# readme".into())),
        ]
    }

    #[test]
    fn context_uses_directory_group_of_active_file() {
        let ctx = build_file_context(&forest(), Some("src/main.rs"));
        assert!(ctx.contains("=== src/main.rs ===\nfn main() {}"));
        assert!(ctx.contains("=== src/lib.rs ==="));
        assert!(!ctx.contains("README.md"));
    }

    #[test]
    fn context_without_active_file_takes_first_files() {
        let ctx = build_file_context(&forest(), None);
        assert!(ctx.contains("src/main.rs"));
        assert!(ctx.contains("README.md"));
    }

    #[test]
    fn context_cap_applies_without_active_file() {
        let many: Vec<FileTreeNode> = (0..20)
            .map(|i| {
                FileTreeNode::file(
                    format!("f{}.txt", i),
                    format!("f{}.txt", i),
                    Some("x".into()),
                )
            })
            .collect();
        let ctx = build_file_context(&many, None);
        assert_eq!(ctx.matches("=== ").count(), CONTEXT_FILE_LIMIT);
    }

    #[test]
    fn unloaded_files_are_excluded_from_context() {
        let nodes = vec![FileTreeNode::file("a.txt", "a.txt", None)];
        assert_eq!(build_file_context(&nodes, None), "");
    }
}
