//! The moderation state machine: Submitted -> PendingReview -> {Published,
//! Rejected}. Both terminal states are reached through `dispose`; the two
//! pending states share one persisted form, the queue file.

use adapter::{ArticleResolver, ContentPublisher, MentionVerifier, Notifier};
use domain::{format_comment, ItemId, ItemKind, ModerationError, QueuedItem};
use std::sync::Arc;
use storage::QueueStore;
use tracing::{info, warn};
use url::Url;

pub struct CommentSubmission {
    pub name: String,
    pub email: String,
    pub web: String,
    pub message: String,
    pub uri: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Carries the allocated repository comment id.
    Approved(String),
    Rejected,
}

pub struct ModerationService {
    queue: Arc<dyn QueueStore>,
    resolver: ArticleResolver,
    verifier: Arc<dyn MentionVerifier>,
    publisher: Arc<dyn ContentPublisher>,
    notifier: Arc<dyn Notifier>,
}

impl ModerationService {
    pub fn new(
        queue: Arc<dyn QueueStore>,
        resolver: ArticleResolver,
        verifier: Arc<dyn MentionVerifier>,
        publisher: Arc<dyn ContentPublisher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            queue,
            resolver,
            verifier,
            publisher,
            notifier,
        }
    }

    pub async fn submit_comment(
        &self,
        form: CommentSubmission,
    ) -> Result<QueuedItem, ModerationError> {
        let name = form.name.trim().to_string();
        if name.is_empty() {
            return Err(ModerationError::Validation("Name is mandatory.".to_string()));
        }

        let email = form.email.trim().to_string();
        if !email.is_empty() && (!email.contains('@') || email.chars().any(char::is_whitespace)) {
            return Err(ModerationError::Validation("Invalid email.".to_string()));
        }

        let web = form.web.trim().to_string();
        if !web.is_empty() && !is_http_url(&web) {
            return Err(ModerationError::Validation("Invalid website.".to_string()));
        }

        let message = form.message.trim();
        if message.is_empty() {
            return Err(ModerationError::Validation(
                "Comment message is mandatory.".to_string(),
            ));
        }
        let message_html = format_comment(message);

        let uri = form.uri.trim().to_string();
        validate_uri(&uri)?;
        let article = self.resolve_article(&uri).await?;

        let item = QueuedItem::comment(
            uri,
            article.path,
            article.title,
            name,
            (!email.is_empty()).then_some(email),
            (!web.is_empty()).then_some(web),
            message_html,
        );
        self.queue.insert(&item).await?;
        self.notifier.notify_new_comment(&item).await?;

        info!(id = %item.id, uri = %item.uri, "comment queued for review");
        Ok(item)
    }

    pub async fn submit_mention(
        &self,
        source: &str,
        target: &str,
    ) -> Result<QueuedItem, ModerationError> {
        let source = source.trim();
        let target = target.trim();
        if source.is_empty() || target.is_empty() {
            return Err(ModerationError::Validation(
                "Source and target are mandatory.".to_string(),
            ));
        }

        let source_url = Url::parse(source)
            .map_err(|_| ModerationError::Validation("Failed to parse source URL.".to_string()))?;
        if !matches!(source_url.scheme(), "http" | "https") {
            return Err(ModerationError::Validation(
                "Failed to parse source URL.".to_string(),
            ));
        }

        let target_url = Url::parse(target)
            .map_err(|_| ModerationError::Validation("Failed to parse target URL.".to_string()))?;
        let uri = target_url.path().to_string();
        validate_uri(&uri)?;
        let article = self.resolve_article(&uri).await?;

        // Persisted unverified: extraction runs when the moderator opens the
        // review page, keeping submission fast and side-effect-light.
        let item = QueuedItem::mention(uri, article.path, article.title, source);
        self.queue.insert(&item).await?;
        self.notifier.notify_new_mention(&item).await?;

        info!(id = %item.id, source = %source, "mention queued for review");
        Ok(item)
    }

    /// Loads an item for the review page. Mentions are (re-)verified on
    /// every view; a successful verification is persisted, a failed one is
    /// attached to the returned item only.
    pub async fn review(&self, id: &str) -> Result<QueuedItem, ModerationError> {
        let id = ItemId::new(id).map_err(ModerationError::Validation)?;
        let mut item = self.queue.get(&id).await?;

        if item.kind == ItemKind::Mention {
            let source = item.source.clone().unwrap_or_default();
            match self.verifier.verify(&source, &item.uri).await {
                Ok(facts) => {
                    if facts.name.is_some() {
                        item.name = facts.name;
                    }
                    if facts.web.is_some() {
                        item.web = facts.web;
                    }
                    if facts.title.is_some() {
                        item.mention_title = facts.title;
                    }
                    if facts.message.is_some() {
                        item.message = facts.message;
                    }
                    self.queue.put(&item).await?;
                }
                Err(e) => {
                    warn!(id = %item.id, "mention verification failed: {}", e);
                    item.extraction_error = Some(e.to_string());
                }
            }
        }

        Ok(item)
    }

    /// The terminal transition. Approval publishes first and only deletes
    /// the queue entry once the publish succeeded, so a failed publish
    /// leaves the submission pending instead of losing it.
    pub async fn dispose(
        &self,
        id: &str,
        decision: Decision,
        reply: Option<&str>,
        email_reply: bool,
    ) -> Result<Outcome, ModerationError> {
        let id = ItemId::new(id).map_err(ModerationError::Validation)?;
        let item = self.queue.get(&id).await?;

        let reply_html = reply
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(format_comment);

        let outcome = match decision {
            Decision::Approve => {
                let comment_id = self.publisher.publish(&item, reply_html.as_deref()).await?;
                Outcome::Approved(comment_id)
            }
            Decision::Reject => Outcome::Rejected,
        };

        self.queue.delete(&id).await?;
        info!(id = %id, ?outcome, "item disposed");

        if let Some(reply_html) = &reply_html {
            if email_reply && item.email.is_some() {
                let approved = matches!(outcome, Outcome::Approved(_));
                self.notifier.notify_reply(&item, reply_html, approved).await?;
            }
        }

        Ok(outcome)
    }

    async fn resolve_article(&self, uri: &str) -> Result<adapter::Article, ModerationError> {
        self.resolver.resolve(uri).await.map_err(|_| {
            ModerationError::Validation("Could not find article path.".to_string())
        })
    }
}

fn validate_uri(uri: &str) -> Result<(), ModerationError> {
    if uri.is_empty() || !uri.starts_with('/') || uri.chars().any(char::is_whitespace) {
        return Err(ModerationError::Validation(
            "Article URI not specified or invalid.".to_string(),
        ));
    }
    Ok(())
}

fn is_http_url(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    match Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "http" | "https"),
        Err(_) => false,
    }
}
