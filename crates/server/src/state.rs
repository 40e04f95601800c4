use crate::moderation::ModerationService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ModerationService>,
    pub base_url: String,
}
