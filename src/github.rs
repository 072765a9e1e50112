use crate::enrich::ContentFetcher;
use crate::error::ApiError;
use crate::models::{RepoEntry, RepoInfo};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

const API_BASE: &str = "https://api.github.com";
const RAW_BASE: &str = "https://raw.githubusercontent.com";
const USER_AGENT: &str = "codedesk";

/// Client for the repository content source and write collaborator. The
/// token travels only as an Authorization header, never interpolated into
/// anything else.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    token: Option<String>,
}

#[derive(Deserialize)]
struct TreeResponse {
    tree: Vec<RepoEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct BranchResponse {
    commit: BranchCommit,
}

#[derive(Deserialize)]
struct BranchCommit {
    sha: String,
    commit: CommitDetail,
}

#[derive(Deserialize)]
struct CommitDetail {
    tree: ShaRef,
}

#[derive(Deserialize)]
struct ShaRef {
    sha: String,
}

#[derive(Serialize)]
struct TreeItem {
    path: String,
    mode: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    sha: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RepoSummary {
    pub name: String,
    pub full_name: String,
    pub default_branch: String,
    pub private: bool,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Self {
        GitHubClient {
            http: reqwest::Client::new(),
            token,
        }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", USER_AGENT);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, ApiError> {
        let token = self.token.as_ref().ok_or_else(|| {
            ApiError::Unauthorized("a GitHub token is required for write operations".to_string())
        })?;
        Ok(self
            .http
            .post(url)
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", USER_AGENT)
            .bearer_auth(token))
    }

    fn patch(&self, url: &str) -> Result<reqwest::RequestBuilder, ApiError> {
        let token = self.token.as_ref().ok_or_else(|| {
            ApiError::Unauthorized("a GitHub token is required for write operations".to_string())
        })?;
        Ok(self
            .http
            .patch(url)
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", USER_AGENT)
            .bearer_auth(token))
    }

    fn check_status(status: StatusCode, what: &str) -> Result<(), ApiError> {
        match status {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound(format!(
                "{}: not found upstream (is the repository public?)",
                what
            ))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::Unauthorized(
                format!("{}: credential missing or rejected", what),
            )),
            s => Err(ApiError::Upstream(format!("{}: GitHub returned {}", what, s))),
        }
    }

    /// Flat recursive listing of the repository at `branch`.
    pub async fn fetch_repo_tree(&self, repo: &RepoInfo) -> Result<Vec<RepoEntry>, ApiError> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            API_BASE, repo.owner, repo.repo, repo.branch
        );
        debug!("Fetching repository tree: {}/{}@{}", repo.owner, repo.repo, repo.branch);

        let response = self.get(&url).send().await?;
        Self::check_status(response.status(), "repository tree")?;
        let body: TreeResponse = response
            .json()
            .await
            .map_err(|e| ApiError::upstream("malformed tree payload", e))?;
        if body.truncated {
            warn!(
                "Tree listing for {}/{} was truncated by GitHub",
                repo.owner, repo.repo
            );
        }
        Ok(body.tree)
    }

    /// Raw file content at `path` on `branch`.
    pub async fn fetch_file_content(
        &self,
        repo: &RepoInfo,
        path: &str,
    ) -> Result<String, ApiError> {
        let url = format!(
            "{}/{}/{}/{}/{}",
            RAW_BASE, repo.owner, repo.repo, repo.branch, path
        );
        let response = self.get(&url).send().await?;
        Self::check_status(response.status(), path)?;
        Ok(response.text().await?)
    }

    /// Repositories visible to the configured credential.
    pub async fn list_repos(&self) -> Result<Vec<RepoSummary>, ApiError> {
        if self.token.is_none() {
            return Err(ApiError::Unauthorized(
                "a GitHub token is required to list repositories".to_string(),
            ));
        }
        let url = format!("{}/user/repos?per_page=100&sort=updated", API_BASE);
        let response = self.get(&url).send().await?;
        Self::check_status(response.status(), "repository listing")?;
        response
            .json()
            .await
            .map_err(|e| ApiError::upstream("malformed repository listing", e))
    }

    /// Commits `files` to the branch head: blob creation, tree creation,
    /// commit, ref update. Reported atomic-or-failed; a failure mid-sequence
    /// surfaces as one error with no partial-state handling.
    pub async fn push_files(
        &self,
        repo: &RepoInfo,
        message: &str,
        files: &[(String, String)],
    ) -> Result<String, ApiError> {
        info!(
            "Pushing {} file(s) to {}/{}@{}",
            files.len(),
            repo.owner,
            repo.repo,
            repo.branch
        );

        let branch_url = format!(
            "{}/repos/{}/{}/branches/{}",
            API_BASE, repo.owner, repo.repo, repo.branch
        );
        let response = self.get(&branch_url).send().await?;
        Self::check_status(response.status(), "branch head")?;
        let branch: BranchResponse = response
            .json()
            .await
            .map_err(|e| ApiError::upstream("malformed branch payload", e))?;
        let parent_sha = branch.commit.sha;
        let base_tree = branch.commit.commit.tree.sha;

        let mut tree_items = Vec::with_capacity(files.len());
        for (path, content) in files {
            let url = format!("{}/repos/{}/{}/git/blobs", API_BASE, repo.owner, repo.repo);
            let response = self
                .post(&url)?
                .json(&json!({ "content": content, "encoding": "utf-8" }))
                .send()
                .await?;
            Self::check_status(response.status(), "blob creation")?;
            let blob: ShaRef = response
                .json()
                .await
                .map_err(|e| ApiError::upstream("malformed blob payload", e))?;
            tree_items.push(TreeItem {
                path: path.clone(),
                mode: "100644",
                kind: "blob",
                sha: blob.sha,
            });
        }

        let url = format!("{}/repos/{}/{}/git/trees", API_BASE, repo.owner, repo.repo);
        let response = self
            .post(&url)?
            .json(&json!({ "base_tree": base_tree, "tree": tree_items }))
            .send()
            .await?;
        Self::check_status(response.status(), "tree creation")?;
        let tree: ShaRef = response
            .json()
            .await
            .map_err(|e| ApiError::upstream("malformed tree payload", e))?;

        let url = format!("{}/repos/{}/{}/git/commits", API_BASE, repo.owner, repo.repo);
        let response = self
            .post(&url)?
            .json(&json!({ "message": message, "tree": tree.sha, "parents": [parent_sha] }))
            .send()
            .await?;
        Self::check_status(response.status(), "commit creation")?;
        let commit: ShaRef = response
            .json()
            .await
            .map_err(|e| ApiError::upstream("malformed commit payload", e))?;

        let url = format!(
            "{}/repos/{}/{}/git/refs/heads/{}",
            API_BASE, repo.owner, repo.repo, repo.branch
        );
        let response = self
            .patch(&url)?
            .json(&json!({ "sha": commit.sha }))
            .send()
            .await?;
        Self::check_status(response.status(), "ref update")?;

        info!("Pushed commit {} to {}/{}", commit.sha, repo.owner, repo.repo);
        Ok(commit.sha)
    }
}

/// Adapts the client to the enricher's fetch capability for one repository.
pub struct RepoContentFetcher {
    pub client: GitHubClient,
    pub repo: RepoInfo,
}

#[async_trait]
impl ContentFetcher for RepoContentFetcher {
    async fn fetch(&self, path: &str) -> Result<String, ApiError> {
        self.client.fetch_file_content(&self.repo, path).await
    }
}
