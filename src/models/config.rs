//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Results page and HTTP client settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Polling period and manual refresh cooldown
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Race facts used for filtering and estimation
    #[serde(default)]
    pub race: RaceConfig,

    /// HTTP API settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.source.url {
            url::Url::parse(url)?;
        }
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        if self.schedule.poll_interval_secs == 0 {
            return Err(AppError::validation(
                "schedule.poll_interval_secs must be > 0",
            ));
        }
        if !(self.race.course_distance_km.is_finite() && self.race.course_distance_km > 0.0) {
            return Err(AppError::validation(
                "race.course_distance_km must be a positive number",
            ));
        }
        if self.server.subscriber_buffer == 0 {
            return Err(AppError::validation("server.subscriber_buffer must be > 0"));
        }
        Ok(())
    }

    /// Apply process environment overrides on top of file values.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`; blank values are ignored.
    ///
    /// Recognized keys: `SOURCE_URL`, `POLL_INTERVAL_MS`, `TEAM_NAME`,
    /// `RACE_START` (RFC 3339) and `PORT`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = get("SOURCE_URL") {
            self.source.url = Some(url);
        }
        if let Some(ms) = get("POLL_INTERVAL_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| AppError::config(format!("POLL_INTERVAL_MS is not a number: {ms}")))?;
            self.schedule.poll_interval_secs = ms.div_ceil(1000).max(1);
        }
        if let Some(team) = get("TEAM_NAME") {
            self.race.team_filter = Some(team);
        }
        if let Some(start) = get("RACE_START") {
            let start = DateTime::parse_from_rfc3339(&start)
                .map_err(|e| AppError::config(format!("RACE_START '{start}': {e}")))?;
            self.race.start = Some(start.with_timezone(&Utc));
        }
        if let Some(port) = get("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|_| AppError::config(format!("PORT is not a valid port: {port}")))?;
            let host = self
                .server
                .bind
                .rsplit_once(':')
                .map_or("0.0.0.0", |(host, _)| host);
            self.server.bind = format!("{host}:{port}");
        }
        Ok(())
    }
}

/// Results page location and HTTP client behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Results page to scrape; nothing is fetched when absent
    #[serde(default)]
    pub url: Option<String>,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: None,
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Cycle timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between scheduled cycles
    #[serde(default = "defaults::poll_interval")]
    pub poll_interval_secs: u64,

    /// Minimum seconds between two triggered cycles
    #[serde(default = "defaults::refresh_cooldown")]
    pub refresh_cooldown_secs: u64,
}

impl ScheduleConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn refresh_cooldown(&self) -> Duration {
        Duration::from_secs(self.refresh_cooldown_secs)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: defaults::poll_interval(),
            refresh_cooldown_secs: defaults::refresh_cooldown(),
        }
    }
}

/// Race-wide facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceConfig {
    /// Gun time; estimation is disabled when absent
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,

    /// Total course length, the upper bound of any estimate
    #[serde(default = "defaults::course_distance")]
    pub course_distance_km: f64,

    /// Case-sensitive substring a non-empty team must contain
    #[serde(default)]
    pub team_filter: Option<String>,
}

impl RaceConfig {
    /// The team filter, ignoring blank values.
    pub fn team_filter(&self) -> Option<&str> {
        self.team_filter
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            start: None,
            course_distance_km: defaults::course_distance(),
            team_filter: None,
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "defaults::bind")]
    pub bind: String,

    /// Messages buffered per live subscriber before drops
    #[serde(default = "defaults::subscriber_buffer")]
    pub subscriber_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: defaults::bind(),
            subscriber_buffer: defaults::subscriber_buffer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Source defaults
    pub fn user_agent() -> String {
        "crew-tracker/1.1".into()
    }
    pub fn timeout() -> u64 {
        15
    }

    // Schedule defaults
    pub fn poll_interval() -> u64 {
        30
    }
    pub fn refresh_cooldown() -> u64 {
        20
    }

    // Race defaults
    pub fn course_distance() -> f64 {
        42.195
    }

    // Server defaults
    pub fn bind() -> String {
        "0.0.0.0:3000".into()
    }
    pub fn subscriber_buffer() -> usize {
        16
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.source.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_source_url() {
        let mut config = Config::default();
        config.source.url = Some("not a url".to_string());
        assert!(matches!(config.validate(), Err(AppError::Url(_))));
    }

    #[test]
    fn validate_rejects_non_positive_course() {
        let mut config = Config::default();
        config.race.course_distance_km = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_team_filter_is_ignored() {
        let mut race = RaceConfig::default();
        assert_eq!(race.team_filter(), None);
        race.team_filter = Some("   ".to_string());
        assert_eq!(race.team_filter(), None);
        race.team_filter = Some(" Runners ".to_string());
        assert_eq!(race.team_filter(), Some("Runners"));
    }

    #[test]
    fn load_partial_toml_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[source]
url = "https://results.example/live"

[race]
start = "2025-11-02T08:00:00+09:00"
team_filter = "Crew"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(
            config.source.url.as_deref(),
            Some("https://results.example/live")
        );
        assert_eq!(config.source.user_agent, "crew-tracker/1.1");
        assert_eq!(config.schedule.poll_interval_secs, 30);
        assert_eq!(config.race.course_distance_km, 42.195);
        assert_eq!(
            config.race.start.map(|t| t.timestamp()),
            Some(1_762_038_000)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let env = |key: &str| match key {
            "SOURCE_URL" => Some("https://results.example/race".to_string()),
            "POLL_INTERVAL_MS" => Some("15500".to_string()),
            "TEAM_NAME" => Some("Crew".to_string()),
            "RACE_START" => Some("2025-11-02T08:00:00+09:00".to_string()),
            "PORT" => Some("8080".to_string()),
            _ => None,
        };

        let mut config = Config::default();
        config.apply_overrides(env).unwrap();
        assert_eq!(config.source.url.as_deref(), Some("https://results.example/race"));
        assert_eq!(config.schedule.poll_interval_secs, 16);
        assert_eq!(config.race.team_filter(), Some("Crew"));
        assert_eq!(config.race.start.map(|t| t.timestamp()), Some(1_762_038_000));
        assert_eq!(config.server.bind, "0.0.0.0:8080");
    }

    #[test]
    fn env_overrides_reject_garbage() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| (key == "PORT").then(|| "http".to_string()));
        assert!(matches!(result, Err(AppError::Config(_))));

        let result =
            config.apply_overrides(|key| (key == "RACE_START").then(|| "yesterday".to_string()));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = Config::default();
        config
            .apply_overrides(|_| Some("  ".to_string()))
            .unwrap();
        assert!(config.source.url.is_none());
        assert_eq!(config.server.bind, "0.0.0.0:3000");
    }

    #[test]
    fn load_or_default_falls_back_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("missing.toml"));
        assert_eq!(config.server.bind, "0.0.0.0:3000");
        assert!(config.source.url.is_none());
    }
}
