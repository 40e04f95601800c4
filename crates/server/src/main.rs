mod config;
mod http;
mod moderation;
mod render;
mod state;

use anyhow::Context;
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::info;

use adapter::{
    ArticleResolver, GithubClient, GithubSettings, MailSettings, MentionExtractor,
    PublishSettings, Publisher, SmtpNotifier,
};
use config::Settings;
use http::router::build_router;
use moderation::ModerationService;
use state::AppState;
use storage::FileQueue;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let settings = Settings::new().context("Failed to load configuration")?;

    let queue = Arc::new(FileQueue::new(&settings.site.queue_dir));
    let resolver = ArticleResolver::new(&settings.site.public_dir);
    let verifier = Arc::new(
        MentionExtractor::new(settings.site.base_url.clone())
            .context("Failed to build mention fetcher")?,
    );

    let github = Arc::new(
        GithubClient::new(GithubSettings {
            api_root: settings.github.api_root.clone(),
            user: settings.github.user.clone(),
            repository: settings.github.repository.clone(),
            token: settings.github.token.clone(),
        })
        .context("Failed to build content repository client")?,
    );
    let publisher = Arc::new(Publisher::new(
        github,
        PublishSettings {
            branch: settings.github.branch.clone(),
            retry_on_conflict: settings.publish.retry_on_conflict,
            max_attempts: settings.publish.max_attempts,
            hook: settings.publish.hook.clone(),
            hook_delay_secs: settings.publish.hook_delay_secs,
        },
    ));

    let notifier = Arc::new(
        SmtpNotifier::new(MailSettings {
            smtp_server: settings.mail.smtp_server.clone(),
            sender: settings.mail.sender.clone(),
            base_url: settings.site.base_url.clone(),
            enabled: settings.mail.enabled,
        })
        .context("Failed to build mail transport")?,
    );

    let service = Arc::new(ModerationService::new(
        queue, resolver, verifier, publisher, notifier,
    ));
    let state = AppState {
        service,
        base_url: settings.site.base_url.clone(),
    };

    let app = build_router(state, &settings.server.cors_origins);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address: {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
