//! Moderation and reply notifications over SMTP.

use async_trait::async_trait;
use domain::{ModerationError, QueuedItem};
use lettre::message::Mailbox;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub smtp_server: String,
    pub sender: String,
    pub base_url: String,
    pub enabled: bool,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Tells the moderator about a fresh submission, with the review link.
    async fn notify_new_comment(&self, item: &QueuedItem) -> Result<(), ModerationError>;

    async fn notify_new_mention(&self, item: &QueuedItem) -> Result<(), ModerationError>;

    /// Mails the commenter the moderator's reply.
    async fn notify_reply(
        &self,
        item: &QueuedItem,
        reply_html: &str,
        approved: bool,
    ) -> Result<(), ModerationError>;
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    settings: MailSettings,
}

impl SmtpNotifier {
    pub fn new(settings: MailSettings) -> anyhow::Result<Self> {
        // Plain relay to the configured server, typically localhost.
        let transport =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.smtp_server).build();
        Ok(Self {
            transport,
            settings,
        })
    }

    fn review_url(&self, item: &QueuedItem) -> String {
        format!("{}/comment/review/{}", self.settings.base_url, item.id)
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> Result<(), ModerationError> {
        if !self.settings.enabled {
            info!(%subject, "mail disabled, notification skipped");
            return Ok(());
        }

        let notification = |e: &dyn std::fmt::Display| {
            ModerationError::Notification(format!("mail to {}: {}", to, e))
        };

        let from: Mailbox = self.settings.sender.parse().map_err(|e| notification(&e))?;
        let to: Mailbox = to.parse().map_err(|e| notification(&e))?;
        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(header_safe(subject))
            .body(body)
            .map_err(|e| notification(&e))?;

        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| notification(&e))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify_new_comment(&self, item: &QueuedItem) -> Result<(), ModerationError> {
        let subject = format!(
            "New comment by {} on {}",
            item.name.as_deref().unwrap_or("(unknown)"),
            item.title
        );
        let body = format!(
            "A new comment is awaiting moderation.\n\n\
             Article: {}\nName: {}\nEmail: {}\nWebsite: {}\n\n{}\n\nReview: {}\n",
            item.uri,
            item.name.as_deref().unwrap_or(""),
            item.email.as_deref().unwrap_or(""),
            item.web.as_deref().unwrap_or(""),
            item.message.as_deref().unwrap_or(""),
            self.review_url(item),
        );
        let moderator = self.settings.sender.clone();
        self.send(&moderator, &subject, body).await
    }

    async fn notify_new_mention(&self, item: &QueuedItem) -> Result<(), ModerationError> {
        let subject = format!("New mention of {}", item.title);
        let body = format!(
            "A new mention is awaiting moderation.\n\n\
             Article: {}\nSource: {}\n\nReview: {}\n",
            item.uri,
            item.source.as_deref().unwrap_or(""),
            self.review_url(item),
        );
        let moderator = self.settings.sender.clone();
        self.send(&moderator, &subject, body).await
    }

    async fn notify_reply(
        &self,
        item: &QueuedItem,
        reply_html: &str,
        approved: bool,
    ) -> Result<(), ModerationError> {
        let email = item.email.as_deref().ok_or_else(|| {
            ModerationError::Notification("item carries no contact email".to_string())
        })?;
        let subject = format!("Reply to your comment on {}", item.title);
        let status = if approved {
            "Your comment has been published."
        } else {
            "Your comment was not published."
        };
        let body = format!(
            "{}\n\nThe author replied:\n\n{}\n\nArticle: {}{}\n",
            status, reply_html, self.settings.base_url, item.uri,
        );
        self.send(email, &subject, body).await
    }
}

/// Strips ASCII control characters before the value reaches a mail header;
/// raw newlines in a subject would allow header injection.
fn header_safe(value: &str) -> String {
    value.chars().filter(|c| !c.is_control()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_characters_are_stripped_from_headers() {
        assert_eq!(
            header_safe("Subject\r\nBcc: victim@example.com"),
            "SubjectBcc: victim@example.com"
        );
        assert_eq!(header_safe("plain subject"), "plain subject");
    }
}
