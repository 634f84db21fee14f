use chrono::FixedOffset;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 9099;
pub const DEFAULT_BIND: &str = "0.0.0.0";
/// Calendar zone for incoming timestamps (UTC+8, no DST).
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 8;
pub const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

/// Top-level config (timehook.toml + TIMEHOOK_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimehookConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

/// Task manager and trigger engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Fixed offset every submitted timestamp is interpreted in.
    /// Callers cannot supply their own zone.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    /// Upper bound for a single outbound notification request.
    #[serde(default = "default_notify_timeout_secs")]
    pub notify_timeout_secs: u64,
    /// How often the trigger engine checks for due entries.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
            notify_timeout_secs: DEFAULT_NOTIFY_TIMEOUT_SECS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

impl SchedulerConfig {
    /// The configured zone, or `None` when the offset is outside ±23h.
    pub fn timezone(&self) -> Option<FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_utc_offset_hours() -> i32 {
    DEFAULT_UTC_OFFSET_HOURS
}
fn default_notify_timeout_secs() -> u64 {
    DEFAULT_NOTIFY_TIMEOUT_SECS
}
fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

impl TimehookConfig {
    /// Load config from a TOML file with TIMEHOOK_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `TIMEHOOK_SCHEDULER__UTC_OFFSET_HOURS=0`.
    ///
    /// The file is `config_path` when given, else `~/.timehook/timehook.toml`.
    /// A missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: TimehookConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("TIMEHOOK_").split("__"))
            .extract()
            .map_err(|e| crate::error::TimehookError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.timehook/timehook.toml", home)
}
