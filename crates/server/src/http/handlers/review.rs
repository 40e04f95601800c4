//! Moderator-facing review endpoints, reached through the links in the
//! notification mails.

use crate::moderation::{Decision, Outcome};
use crate::render::review_page;
use crate::state::AppState;
use axum::extract::{Form, Path, State};
use axum::http::StatusCode;
use axum::response::Html;
use domain::ModerationError;
use serde::Deserialize;
use tracing::error;

pub async fn show_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, (StatusCode, String)> {
    let item = state.service.review(&id).await.map_err(error_response)?;
    Ok(Html(review_page(&item, &state.base_url)))
}

#[derive(Deserialize)]
pub struct DisposeForm {
    #[serde(default)]
    pub approve: Option<String>,
    #[serde(default)]
    pub reject: Option<String>,
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub email_reply: Option<String>,
}

pub async fn dispose(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<DisposeForm>,
) -> Result<String, (StatusCode, String)> {
    let decision = match (form.approve.is_some(), form.reject.is_some()) {
        (true, false) => Decision::Approve,
        (false, true) => Decision::Reject,
        _ => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Specify either approve or reject.".to_string(),
            ))
        }
    };

    let outcome = state
        .service
        .dispose(&id, decision, form.reply.as_deref(), form.email_reply.is_some())
        .await
        .map_err(error_response)?;

    Ok(match outcome {
        Outcome::Approved(_) => "Comment has been approved.".to_string(),
        Outcome::Rejected => "Comment has been rejected.".to_string(),
    })
}

// Review links reach a single trusted moderator; the status signals only
// "worked" or "did not", so every failure class collapses to 500.
fn error_response(e: ModerationError) -> (StatusCode, String) {
    match e {
        ModerationError::Validation(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        ModerationError::NotFound(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Unknown review item.".to_string(),
        ),
        other => {
            error!("review operation failed: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Operation failed, the item is still queued.".to_string(),
            )
        }
    }
}
