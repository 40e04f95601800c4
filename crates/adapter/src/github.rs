//! Thin client for the GitHub REST v3 data API: read a branch tip, list a
//! directory, fetch raw file content, and create tree/commit/ref objects.
//! The publish protocol on top of these calls lives in `publisher`.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoApiError {
    #[error("request to content repository failed: {0}")]
    Http(String),

    #[error("unexpected response from content repository: {0}")]
    Response(String),

    /// The branch ref moved between reading the tip and updating it. The
    /// optimistic publish lost the race; retrying is the caller's choice.
    #[error("branch ref moved while publishing")]
    RefConflict,
}

#[derive(Debug, Clone)]
pub struct BranchTip {
    pub commit_sha: String,
    pub tree_sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub download_url: Option<String>,
}

/// A blob to include in the next commit, repository-relative.
#[derive(Debug, Clone)]
pub struct TreeEntry {
    pub path: String,
    pub content: String,
}

#[async_trait]
pub trait RepoApi: Send + Sync {
    async fn branch_tip(&self, branch: &str) -> Result<BranchTip, RepoApiError>;

    async fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, RepoApiError>;

    /// Fetches a blob by its raw-content URL as returned in `DirEntry`.
    async fn fetch_raw(&self, url: &str) -> Result<String, RepoApiError>;

    /// Creates a tree on top of `base_tree`; returns the new tree sha.
    async fn create_tree(
        &self,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<String, RepoApiError>;

    /// Creates a commit with a single parent; returns the new commit sha.
    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parent: &str,
    ) -> Result<String, RepoApiError>;

    /// Fast-forwards the branch ref. `RefConflict` when the remote rejects a
    /// non-fast-forward update.
    async fn update_ref(&self, branch: &str, commit_sha: &str) -> Result<(), RepoApiError>;
}

#[derive(Debug, Clone)]
pub struct GithubSettings {
    pub api_root: String,
    pub user: String,
    pub repository: String,
    pub token: String,
}

pub struct GithubClient {
    http: reqwest::Client,
    settings: GithubSettings,
}

#[derive(Deserialize)]
struct ShaOnly {
    sha: String,
}

#[derive(Deserialize)]
struct CommitResponse {
    sha: String,
    commit: CommitDetail,
}

#[derive(Deserialize)]
struct CommitDetail {
    tree: ShaOnly,
}

impl GithubClient {
    pub fn new(settings: GithubSettings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, settings })
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.settings.api_root, self.settings.user, self.settings.repository, path
        )
    }

    fn user_agent(&self) -> String {
        format!("Blog comment management (user {})", self.settings.user)
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, RepoApiError> {
        let mut request = self
            .http
            .request(method, self.repo_url(path))
            .header(AUTHORIZATION, format!("token {}", self.settings.token))
            .header(USER_AGENT, self.user_agent());
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json; charset=utf-8")
                .json(&body);
        }
        request
            .send()
            .await
            .map_err(|e| RepoApiError::Http(e.to_string()))
    }

    async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response, RepoApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RepoApiError::Response(format!("{}: {}", status, body)))
    }
}

#[async_trait]
impl RepoApi for GithubClient {
    async fn branch_tip(&self, branch: &str) -> Result<BranchTip, RepoApiError> {
        let response = self
            .call(Method::GET, &format!("commits/{}", branch), None)
            .await?;
        let parsed: CommitResponse = Self::expect_success(response)
            .await?
            .json()
            .await
            .map_err(|e| RepoApiError::Response(e.to_string()))?;
        Ok(BranchTip {
            commit_sha: parsed.sha,
            tree_sha: parsed.commit.tree.sha,
        })
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, RepoApiError> {
        let response = self
            .call(Method::GET, &format!("contents/{}", path), None)
            .await?;
        Self::expect_success(response)
            .await?
            .json()
            .await
            .map_err(|e| RepoApiError::Response(e.to_string()))
    }

    async fn fetch_raw(&self, url: &str) -> Result<String, RepoApiError> {
        let response = self
            .http
            .get(url)
            .header(USER_AGENT, self.user_agent())
            .send()
            .await
            .map_err(|e| RepoApiError::Http(e.to_string()))?;
        Self::expect_success(response)
            .await?
            .text()
            .await
            .map_err(|e| RepoApiError::Response(e.to_string()))
    }

    async fn create_tree(
        &self,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<String, RepoApiError> {
        let tree: Vec<_> = entries
            .iter()
            .map(|entry| {
                json!({
                    "path": entry.path,
                    "mode": "100644",
                    "type": "blob",
                    "content": entry.content,
                })
            })
            .collect();
        let response = self
            .call(
                Method::POST,
                "git/trees",
                Some(json!({ "base_tree": base_tree, "tree": tree })),
            )
            .await?;
        let parsed: ShaOnly = Self::expect_success(response)
            .await?
            .json()
            .await
            .map_err(|e| RepoApiError::Response(e.to_string()))?;
        Ok(parsed.sha)
    }

    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parent: &str,
    ) -> Result<String, RepoApiError> {
        let response = self
            .call(
                Method::POST,
                "git/commits",
                Some(json!({ "message": message, "tree": tree, "parents": [parent] })),
            )
            .await?;
        let parsed: ShaOnly = Self::expect_success(response)
            .await?
            .json()
            .await
            .map_err(|e| RepoApiError::Response(e.to_string()))?;
        Ok(parsed.sha)
    }

    async fn update_ref(&self, branch: &str, commit_sha: &str) -> Result<(), RepoApiError> {
        let response = self
            .call(
                Method::PATCH,
                &format!("git/refs/heads/{}", branch),
                Some(json!({ "sha": commit_sha })),
            )
            .await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(RepoApiError::RefConflict)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(RepoApiError::Response(format!("{}: {}", status, body)))
            }
        }
    }
}
