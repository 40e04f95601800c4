mod content;
mod error;
mod models;

pub use content::{clean_fragment, format_comment, trim_html, ELLIPSIS};
pub use error::{ExtractionError, ModerationError};
pub use models::{timestamp, CommentMeta, ItemId, ItemKind, QueuedItem, ReplyMeta};
