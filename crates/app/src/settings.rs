//! Settings for the application, read from an optional `settings.toml`
//! and overridden by `SMARTBUDGET__<SECTION>__<KEY>` environment variables.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
}

#[derive(Debug, Deserialize)]
pub struct Paystack {
    #[serde(default = "default_paystack_url")]
    pub base_url: String,
    pub secret_key: String,
    /// Paystack signs webhooks with the secret key unless told otherwise.
    pub webhook_secret: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_paystack_url() -> String {
    integrations::PAYSTACK_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize)]
pub struct Notifications {
    pub sendgrid_api_key: Option<String>,
    #[serde(default = "default_from_email")]
    pub from_email: String,
    pub discord_webhook_url: Option<String>,
}

impl Default for Notifications {
    fn default() -> Self {
        Self {
            sendgrid_api_key: None,
            from_email: default_from_email(),
            discord_webhook_url: None,
        }
    }
}

fn default_from_email() -> String {
    "noreply@smartbudget.com".to_string()
}

#[derive(Debug, Deserialize)]
pub struct Jobs {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

impl Default for Jobs {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            tick_secs: default_tick_secs(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_tick_secs() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub server: Server,
    pub paystack: Paystack,
    #[serde(default)]
    pub notifications: Notifications,
    #[serde(default)]
    pub jobs: Jobs,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(
                Environment::with_prefix("SMARTBUDGET")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    pub fn webhook_secret(&self) -> &str {
        self.paystack
            .webhook_secret
            .as_deref()
            .unwrap_or(&self.paystack.secret_key)
    }
}
