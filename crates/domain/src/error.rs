use thiserror::Error;

/// Why mention verification failed. Recorded on the queued item for the
/// moderator; never blocks approve/reject.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("source unreachable: {0}")]
    UnreachableSource(String),

    #[error("unexpected content type: {0}")]
    UnsupportedContentType(String),

    #[error("link to the target article not found on the source page")]
    LinkNotFound,

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum ModerationError {
    /// Malformed or missing submission fields. Surfaced to the submitter,
    /// nothing persisted. The message is user-facing.
    #[error("{0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("mention verification failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// Any step of the publish sequence against the content repository.
    #[error("content repository error: {0}")]
    RemoteApi(String),

    #[error("notification failed: {0}")]
    Notification(String),

    #[error("{0}")]
    Internal(String),
}
