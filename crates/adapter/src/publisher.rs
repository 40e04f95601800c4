//! Durable publication of an approved item into the content repository.
//!
//! The remote API has no multi-file transaction primitive, so the publish
//! protocol builds one atomically-applied commit: read the branch tip
//! (optimistic base), build all blobs, then tree -> commit -> ref update.
//! If any call fails the ref is left unchanged and at worst unreferenced
//! objects are orphaned.

use crate::frontmatter;
use crate::github::{RepoApi, RepoApiError, TreeEntry};
use async_trait::async_trait;
use domain::{timestamp, CommentMeta, ItemKind, ModerationError, QueuedItem, ReplyMeta};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Reply sequence is fixed: the published layout supports at most one
/// moderator reply per comment.
const REPLY_SEQUENCE: &str = "000001";

const COMMIT_MESSAGE: &str = "Added blog comment";

#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub branch: String,
    /// Retry the whole sequence when the branch tip moves underneath us.
    /// Off by default: the historical behavior is to surface the conflict.
    pub retry_on_conflict: bool,
    pub max_attempts: u32,
    /// Shell command spawned fire-and-forget after a successful publish.
    pub hook: Option<String>,
    pub hook_delay_secs: u64,
}

#[async_trait]
pub trait ContentPublisher: Send + Sync {
    /// Publishes the item (and an optional moderator reply), returning the
    /// allocated comment id.
    async fn publish(
        &self,
        item: &QueuedItem,
        reply_html: Option<&str>,
    ) -> Result<String, ModerationError>;
}

pub struct Publisher {
    api: Arc<dyn RepoApi>,
    settings: PublishSettings,
}

impl Publisher {
    pub fn new(api: Arc<dyn RepoApi>, settings: PublishSettings) -> Self {
        Self { api, settings }
    }

    async fn publish_once(
        &self,
        item: &QueuedItem,
        reply_html: Option<&str>,
    ) -> Result<String, RepoApiError> {
        let tip = self.api.branch_tip(&self.settings.branch).await?;

        let article_dir = item.article.trim_matches('/');
        let listing = self.api.list_dir(&format!("content/{}", article_dir)).await?;

        let mut index_url = None;
        let mut index_path = None;
        let mut max_sequence = 0u32;
        for entry in &listing {
            if entry.entry_type != "file" {
                continue;
            }
            if entry.name.starts_with("index.") {
                index_path = Some(entry.path.clone());
                index_url = entry.download_url.clone();
            }
            if let Some(sequence) = comment_sequence(&entry.name) {
                max_sequence = max_sequence.max(sequence);
            }
        }

        let (index_path, index_url) = match (index_path, index_url) {
            (Some(path), Some(url)) => (path, url),
            _ => {
                return Err(RepoApiError::Response(format!(
                    "no index file in content/{}",
                    article_dir
                )))
            }
        };

        let comment_id = format!("{:06}", max_sequence + 1);
        let now = timestamp::now();

        let meta = CommentMeta {
            publish_date: item.submitted_at,
            author: item.name.clone().unwrap_or_default(),
            author_url: item.web.clone().unwrap_or_default(),
            kind: item.kind,
            title: item.mention_title.clone().unwrap_or_default(),
            id: comment_id.clone(),
        };
        let mut entries = vec![TreeEntry {
            path: format!("content/{}/comment_{}.html", article_dir, comment_id),
            content: blob(&meta, item.message.as_deref().unwrap_or(""))?,
        }];

        if let Some(reply_html) = reply_html {
            let reply_meta = ReplyMeta {
                id: REPLY_SEQUENCE.to_string(),
                publish_date: now,
            };
            entries.push(TreeEntry {
                path: format!(
                    "content/{}/comment_{}_reply_{}.html",
                    article_dir, comment_id, REPLY_SEQUENCE
                ),
                content: blob(&reply_meta, reply_html)?,
            });
        }

        let index_contents = self.api.fetch_raw(&index_url).await?;
        let updated_index = frontmatter::set_lastmod(&index_contents, &timestamp::format(&now))
            .map_err(|e| RepoApiError::Response(format!("article index: {}", e)))?;
        entries.push(TreeEntry {
            path: index_path,
            content: updated_index,
        });

        let tree = self.api.create_tree(&tip.tree_sha, &entries).await?;
        let commit = self
            .api
            .create_commit(COMMIT_MESSAGE, &tree, &tip.commit_sha)
            .await?;
        self.api.update_ref(&self.settings.branch, &commit).await?;

        info!(comment_id = %comment_id, article = %article_dir, "comment published");
        Ok(comment_id)
    }

    fn spawn_hook(&self) {
        let Some(hook) = self.settings.hook.clone() else {
            return;
        };
        let delay = Duration::from_secs(self.settings.hook_delay_secs);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match tokio::process::Command::new("sh")
                .arg("-c")
                .arg(&hook)
                .status()
                .await
            {
                Ok(status) if status.success() => info!("post-publish hook finished"),
                Ok(status) => warn!(%status, "post-publish hook failed"),
                Err(e) => error!("post-publish hook could not be spawned: {}", e),
            }
        });
    }
}

#[async_trait]
impl ContentPublisher for Publisher {
    async fn publish(
        &self,
        item: &QueuedItem,
        reply_html: Option<&str>,
    ) -> Result<String, ModerationError> {
        let attempts = if self.settings.retry_on_conflict {
            self.settings.max_attempts.max(1)
        } else {
            1
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.publish_once(item, reply_html).await {
                Ok(comment_id) => {
                    self.spawn_hook();
                    return Ok(comment_id);
                }
                Err(RepoApiError::RefConflict) if attempt < attempts => {
                    warn!(attempt, "branch tip moved, retrying publish");
                }
                Err(e) => return Err(ModerationError::RemoteApi(e.to_string())),
            }
        }
    }
}

fn blob<T: serde::Serialize>(meta: &T, body: &str) -> Result<String, RepoApiError> {
    let header = serde_json::to_string_pretty(meta)
        .map_err(|e| RepoApiError::Response(format!("metadata serialization: {}", e)))?;
    Ok(format!("{}\n\n{}", header, body))
}

/// Parses the numeric sequence out of a `comment_<digits>.<ext>` filename.
/// Reply files and anything else fall through as `None`.
fn comment_sequence(name: &str) -> Option<u32> {
    let rest = name.strip_prefix("comment_")?;
    let digits = rest.split('.').next()?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
