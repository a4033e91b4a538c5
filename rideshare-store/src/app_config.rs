use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub booking: BookingRules,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// When absent the service runs on the in-memory store.
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    /// When absent no rate limiting is applied.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_late_fee_rate")]
    pub late_fee_rate: f64,
    #[serde(default = "default_pin_window")]
    pub pin_window_minutes: i64,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_backoff_ms(),
            late_fee_rate: default_late_fee_rate(),
            pin_window_minutes: default_pin_window(),
        }
    }
}

fn default_max_attempts() -> u32 { 5 }
fn default_backoff_ms() -> u64 { 10 }
fn default_late_fee_rate() -> f64 { 0.25 }
fn default_pin_window() -> i64 { 30 }

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Spawn fanout onto the runtime instead of awaiting it inside the request.
    #[serde(default = "default_background")]
    pub background: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            background: default_background(),
        }
    }
}

fn default_background() -> bool { true }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `RIDESHARE_DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("RIDESHARE").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn from_toml(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
