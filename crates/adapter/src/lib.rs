mod frontmatter;
mod github;
mod mailer;
mod mention;
mod publisher;
mod site;

pub use github::{BranchTip, DirEntry, GithubClient, GithubSettings, RepoApi, RepoApiError, TreeEntry};
pub use mailer::{MailSettings, Notifier, SmtpNotifier};
pub use mention::{MentionExtractor, MentionFacts, MentionVerifier};
pub use publisher::{ContentPublisher, PublishSettings, Publisher};
pub use site::{Article, ArticleResolver};
