//! Public submission endpoints: the comment form and the webmention
//! endpoint. The comment form always answers 200 with a JSON envelope the
//! page script displays inline; the webmention endpoint speaks plain HTTP
//! status codes to other servers.

use crate::moderation::CommentSubmission;
use crate::state::AppState;
use axum::extract::{Form, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use domain::ModerationError;
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub web: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub uri: String,
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub error: bool,
    pub message: String,
}

pub async fn submit_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<CommentForm>,
) -> Json<SubmitResponse> {
    // The form script sets this header; plain cross-site form posts do not.
    if !headers.contains_key("x-xmlhttprequest") {
        return Json(SubmitResponse {
            error: true,
            message: "X-XMLHttpRequest header missing from request.".to_string(),
        });
    }

    let submission = CommentSubmission {
        name: form.name,
        email: form.email,
        web: form.web,
        message: form.message,
        uri: form.uri,
    };

    let response = match state.service.submit_comment(submission).await {
        Ok(_) => SubmitResponse {
            error: false,
            message: "Comment submitted for moderation.".to_string(),
        },
        Err(ModerationError::Validation(message)) => SubmitResponse {
            error: true,
            message,
        },
        Err(e) => {
            error!("comment submission failed: {}", e);
            SubmitResponse {
                error: true,
                message: "Comment could not be submitted.".to_string(),
            }
        }
    };
    Json(response)
}

#[derive(Deserialize)]
pub struct MentionForm {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub target: String,
}

pub async fn submit_mention(
    State(state): State<AppState>,
    Form(form): Form<MentionForm>,
) -> Result<StatusCode, (StatusCode, String)> {
    match state.service.submit_mention(&form.source, &form.target).await {
        Ok(_) => Ok(StatusCode::ACCEPTED),
        Err(ModerationError::Validation(message)) => Err((StatusCode::BAD_REQUEST, message)),
        Err(e) => {
            error!("mention submission failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Mention could not be processed.".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::ModerationService;
    use adapter::{ArticleResolver, ContentPublisher, MentionFacts, MentionVerifier, Notifier};
    use async_trait::async_trait;
    use domain::{ExtractionError, QueuedItem};
    use std::sync::Arc;
    use storage::MemoryQueue;

    struct NoVerifier;

    #[async_trait]
    impl MentionVerifier for NoVerifier {
        async fn verify(
            &self,
            _source: &str,
            _uri: &str,
        ) -> Result<MentionFacts, ExtractionError> {
            Ok(MentionFacts::default())
        }
    }

    struct NoPublisher;

    #[async_trait]
    impl ContentPublisher for NoPublisher {
        async fn publish(
            &self,
            _item: &QueuedItem,
            _reply_html: Option<&str>,
        ) -> Result<String, ModerationError> {
            Ok("000001".to_string())
        }
    }

    struct NoNotifier;

    #[async_trait]
    impl Notifier for NoNotifier {
        async fn notify_new_comment(&self, _item: &QueuedItem) -> Result<(), ModerationError> {
            Ok(())
        }

        async fn notify_new_mention(&self, _item: &QueuedItem) -> Result<(), ModerationError> {
            Ok(())
        }

        async fn notify_reply(
            &self,
            _item: &QueuedItem,
            _reply_html: &str,
            _approved: bool,
        ) -> Result<(), ModerationError> {
            Ok(())
        }
    }

    fn test_state() -> AppState {
        let service = ModerationService::new(
            Arc::new(MemoryQueue::new()),
            ArticleResolver::new("nonexistent"),
            Arc::new(NoVerifier),
            Arc::new(NoPublisher),
            Arc::new(NoNotifier),
        );
        AppState {
            service: Arc::new(service),
            base_url: "http://localhost:1313".to_string(),
        }
    }

    fn alice_form() -> CommentForm {
        CommentForm {
            name: "Alice".to_string(),
            email: String::new(),
            web: String::new(),
            message: "Hello".to_string(),
            uri: "/posts/foo".to_string(),
        }
    }

    #[tokio::test]
    async fn missing_request_header_gets_the_json_envelope() {
        let response =
            submit_comment(State(test_state()), HeaderMap::new(), Form(alice_form())).await;
        assert!(response.0.error);
        assert_eq!(
            response.0.message,
            "X-XMLHttpRequest header missing from request."
        );
    }

    #[tokio::test]
    async fn validation_failures_also_get_the_envelope() {
        let mut headers = HeaderMap::new();
        headers.insert("x-xmlhttprequest", "true".parse().unwrap());
        let mut form = alice_form();
        form.name = String::new();

        let response = submit_comment(State(test_state()), headers, Form(form)).await;
        assert!(response.0.error);
        assert_eq!(response.0.message, "Name is mandatory.");
    }
}
