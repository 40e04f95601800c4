use config::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub site: SiteSettings,
    pub github: GithubSettings,
    pub mail: MailSettings,
    pub publish: PublishSettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: String,
}

#[derive(Deserialize, Clone)]
pub struct SiteSettings {
    /// Scheme + host of the public site, no trailing slash.
    pub base_url: String,
    /// Generated site output, searched for article pages.
    pub public_dir: String,
    /// Where pending queue files live.
    pub queue_dir: String,
}

#[derive(Deserialize, Clone)]
pub struct GithubSettings {
    pub user: String,
    pub repository: String,
    pub token: String,
    pub branch: String,
    pub api_root: String,
}

#[derive(Deserialize, Clone)]
pub struct MailSettings {
    pub smtp_server: String,
    pub sender: String,
    pub enabled: bool,
}

#[derive(Deserialize, Clone)]
pub struct PublishSettings {
    #[serde(default)]
    pub hook: Option<String>,
    pub hook_delay_secs: u64,
    pub retry_on_conflict: bool,
    pub max_attempts: u32,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());
        let env_map = collect_env_vars();

        let s = config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("server.cors_origins", "*")?
            .set_default("site.base_url", "http://localhost:1313")?
            .set_default("site.public_dir", "public")?
            .set_default("site.queue_dir", "queue")?
            .set_default("github.user", "")?
            .set_default("github.repository", "")?
            .set_default("github.token", "")?
            .set_default("github.branch", "main")?
            .set_default("github.api_root", "https://api.github.com")?
            .set_default("mail.smtp_server", "localhost")?
            .set_default("mail.sender", "comments@localhost")?
            .set_default("mail.enabled", false)?
            .set_default("publish.hook_delay_secs", 5)?
            .set_default("publish.retry_on_conflict", false)?
            .set_default("publish.max_attempts", 3)?
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::File::with_name(&format!("config.{}", run_mode)).required(false))
            .add_source(config::File::from_str(
                &serde_json::to_string(&env_map)
                    .expect("Environment variables should serialize to JSON"),
                config::FileFormat::Json,
            ))
            .build()?;

        s.try_deserialize()
    }
}

fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("COMMENTD_"))
        .map(|(k, v)| {
            let new_key = k
                .trim_start_matches("COMMENTD_")
                .replace("__", ".")
                .to_lowercase();
            (new_key, v)
        })
        .collect()
}
