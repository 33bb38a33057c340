use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_data_dir() -> String {
    "./data".into()
}

fn default_threshold_pct() -> f64 {
    1.0
}

fn default_interval_minutes() -> u64 {
    60
}

fn default_cycle_backoff_secs() -> u64 {
    60
}

fn default_send_delay_ms() -> u64 {
    100
}

fn default_moex_base_url() -> String {
    "https://iss.moex.com".into()
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".into()
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub market: MarketConfig,
    pub telegram: TelegramConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

#[derive(Debug, Deserialize)]
pub struct MonitorConfig {
    /// Minimum absolute percentage move that counts as significant.
    #[serde(default = "default_threshold_pct")]
    pub threshold_pct: f64,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    /// Wait after a failed cycle, shorter than the normal interval.
    #[serde(default = "default_cycle_backoff_secs")]
    pub cycle_backoff_secs: u64,
    /// Pause between successive notification sends.
    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            threshold_pct: default_threshold_pct(),
            interval_minutes: default_interval_minutes(),
            cycle_backoff_secs: default_cycle_backoff_secs(),
            send_delay_ms: default_send_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_moex_base_url")]
    pub base_url: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: default_moex_base_url(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !(config.monitor.threshold_pct > 0.0) {
        return Err(Report::new(ConfigError::Validation {
            field: format!(
                "monitor.threshold_pct must be positive, got {}",
                config.monitor.threshold_pct
            ),
        }));
    }

    if config.monitor.interval_minutes == 0 {
        return Err(Report::new(ConfigError::Validation {
            field: "monitor.interval_minutes must be at least 1".into(),
        }));
    }

    if config.monitor.cycle_backoff_secs >= config.monitor.interval_minutes * 60 {
        return Err(Report::new(ConfigError::Validation {
            field: "monitor.cycle_backoff_secs must be shorter than the check interval".into(),
        }));
    }

    if config.telegram.bot_token.trim().is_empty() {
        return Err(Report::new(ConfigError::Validation {
            field: "telegram.bot_token must not be empty".into(),
        }));
    }

    Ok(())
}
