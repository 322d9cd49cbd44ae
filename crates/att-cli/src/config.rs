//! Configuration loading and management.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use att_core::ReconstructionConfig;
use chrono::FixedOffset;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Fixed UTC offset for displaying times and interpreting manual
    /// corrections. The system local zone is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset_minutes: Option<i32>,

    /// Shift reconstruction thresholds.
    #[serde(default)]
    pub reconstruction: ReconstructionConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("att.db"),
            utc_offset_minutes: None,
            reconstruction: ReconstructionConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (ATT_*, nested keys split on `__`)
        figment = figment.merge(Env::prefixed("ATT_").split("__"));

        figment.extract()
    }

    /// Returns the configured fixed offset, if any.
    pub fn fixed_offset(&self) -> Result<Option<FixedOffset>> {
        let Some(minutes) = self.utc_offset_minutes else {
            return Ok(None);
        };
        match minutes.checked_mul(60).and_then(FixedOffset::east_opt) {
            Some(offset) => Ok(Some(offset)),
            None => bail!("utc_offset_minutes out of range: {minutes}"),
        }
    }
}

/// Returns the platform-specific config directory for att.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("att"))
}

/// Returns the platform-specific data directory for att.
///
/// On Linux: `~/.local/share/att`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("att"))
}
