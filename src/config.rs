use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::checker::CheckerSettings;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub professor: ProfessorConfig,
    pub polling: PollingConfig,
    pub state: StateConfig,
    pub messages: MessagesConfig,
}

/// Which professor to watch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfessorConfig {
    /// Numeric RateMyProfessors teacher id
    pub id: u64,
}

impl Default for ProfessorConfig {
    fn default() -> Self {
        Self { id: 2635703 }
    }
}

/// Poll cadence and announcement limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    /// Reviews requested per window
    pub fetch_count: usize,
    /// Max reviews announced on a first-run backfill
    pub backfill_cap: usize,
    /// Pause between individual deliveries, in milliseconds
    pub delivery_delay_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            fetch_count: 10,
            backfill_cap: 5,
            delivery_delay_ms: 1000,
        }
    }
}

/// State file location and retention
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub path: PathBuf,
    /// Seen-list cap; keep well above fetch_count
    pub seen_cap: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("state.json"),
            seen_cap: 200,
        }
    }
}

/// Paths to the random-message lists
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    pub responses_path: PathBuf,
    pub fortunes_path: PathBuf,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            responses_path: PathBuf::from("responses.json"),
            fortunes_path: PathBuf::from("fortunes.json"),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!(path = %path.display(), "Loaded configuration");

        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_secs)
    }

    pub fn checker_settings(&self) -> CheckerSettings {
        CheckerSettings {
            fetch_count: self.polling.fetch_count,
            backfill_cap: self.polling.backfill_cap,
            seen_cap: self.state.seen_cap,
            delivery_delay: Duration::from_millis(self.polling.delivery_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.polling.interval_secs, 600);
        assert_eq!(config.polling.backfill_cap, 5);
        assert!(config.state.seen_cap > config.polling.fetch_count);
        assert_eq!(config.state.path, PathBuf::from("state.json"));
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
professor:
  id: 1234567

polling:
  interval_secs: 120
  backfill_cap: 3

state:
  path: /var/lib/rmp-watch/state.json
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.professor.id, 1234567);
        assert_eq!(config.polling.interval_secs, 120);
        assert_eq!(config.polling.backfill_cap, 3);
        // Unset sections keep their defaults.
        assert_eq!(config.polling.fetch_count, 10);
        assert_eq!(config.messages.responses_path, PathBuf::from("responses.json"));
    }

    #[test]
    fn test_checker_settings_conversion() {
        let mut config = Config::default();
        config.polling.delivery_delay_ms = 250;

        let settings = config.checker_settings();
        assert_eq!(settings.delivery_delay, Duration::from_millis(250));
        assert_eq!(settings.seen_cap, 200);
    }
}
