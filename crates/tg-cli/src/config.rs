//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use tg_core::BadgeConfig;

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the settings database.
    pub database_path: PathBuf,
    /// Length of one countdown tick in milliseconds.
    pub tick_interval_ms: u64,
    /// Badge colors and countdown display.
    pub badge: BadgeConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("tick_interval_ms", &self.tick_interval_ms)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("tabgov.db"),
            tick_interval_ms: 1000,
            badge: BadgeConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, the user config file, `config_path`,
    /// then `TABGOV_*` environment variables (`__` separates nested keys,
    /// as in `TABGOV_BADGE__BASE_COLOR`).
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("TABGOV_").split("__"));

        let config: Self = figment.extract()?;
        if config.tick_interval_ms == 0 {
            return Err(figment::Error::from(
                "tick_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// One countdown second.
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Returns the platform-specific config directory for tabgov.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tabgov"))
}

/// Returns the platform-specific data directory for tabgov.
///
/// On Linux: `~/.local/share/tabgov`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("tabgov"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("tabgov.db"));
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r##"
database_path = "/tmp/elsewhere.db"
tick_interval_ms = 250

[badge]
countdown_color = "#000000"
"##
        )
        .unwrap();

        let config = Config::load_from(Some(file.path())).unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/elsewhere.db"));
        assert_eq!(config.tick_interval(), Duration::from_millis(250));
        assert_eq!(config.badge.countdown_color, "#000000");
        assert_eq!(config.badge.base_color, "#90EE90");
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tick_interval_ms = 0").unwrap();

        let err = Config::load_from(Some(file.path())).unwrap_err();

        assert!(err.to_string().contains("tick_interval_ms"), "{err}");
    }
}
