//! Application configuration
//!
//! Re-exports the shared configuration types from smartscript-types and
//! provides platform defaults and persistence for AppConfig.

use std::path::PathBuf;

use thiserror::Error;

pub use smartscript_types::{AppConfig, EngineConfig};

const APP_NAME: &str = "smartscript";
const CONFIG_NAME: &str = "config";

/// Errors during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration")]
    Load(#[from] confy::ConfyError),

    #[error("failed to save configuration")]
    Save(#[source] confy::ConfyError),

    #[error("rules directory {path} does not exist")]
    MissingRulesDirectory { path: PathBuf },

    #[error("tick must be at least 1 ms")]
    InvalidTick,
}

// ─────────────────────────────────────────────────────────────────────────────
// Platform-Specific Defaults
// ─────────────────────────────────────────────────────────────────────────────

fn default_rules_directory() -> String {
    dirs::data_dir()
        .map(|p| p.join(APP_NAME).join("rules"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// AppConfig Extensions
// ─────────────────────────────────────────────────────────────────────────────

/// Extension trait for AppConfig persistence
pub trait AppConfigExt: Sized {
    fn load() -> Self;
    fn load_with_defaults() -> Self;
    fn try_load() -> Result<Self, ConfigError>;
    fn save(&self) -> Result<(), ConfigError>;
    fn config_path() -> Option<PathBuf>;
    fn set_rules_directory(&mut self, path: PathBuf) -> Result<(), ConfigError>;
    fn set_tick_ms(&mut self, tick_ms: u32) -> Result<(), ConfigError>;
}

impl AppConfigExt for AppConfig {
    fn load() -> Self {
        Self::try_load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default configuration");
            Self::load_with_defaults()
        })
    }

    /// Load with platform-specific defaults (used when no config file exists)
    fn load_with_defaults() -> Self {
        AppConfig::with_rules_directory(default_rules_directory())
    }

    fn try_load() -> Result<Self, ConfigError> {
        let mut config: AppConfig = confy::load(APP_NAME, CONFIG_NAME)?;
        if config.rules_directory.is_empty() {
            config.rules_directory = default_rules_directory();
        }
        Ok(config)
    }

    fn save(&self) -> Result<(), ConfigError> {
        confy::store(APP_NAME, CONFIG_NAME, self).map_err(ConfigError::Save)
    }

    fn config_path() -> Option<PathBuf> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME).ok()
    }

    fn set_rules_directory(&mut self, path: PathBuf) -> Result<(), ConfigError> {
        if !path.is_dir() {
            return Err(ConfigError::MissingRulesDirectory { path });
        }
        self.rules_directory = path.to_string_lossy().into_owned();
        Ok(())
    }

    fn set_tick_ms(&mut self, tick_ms: u32) -> Result<(), ConfigError> {
        if tick_ms == 0 {
            return Err(ConfigError::InvalidTick);
        }
        self.tick_ms = tick_ms;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_into_data_dir() {
        let config = AppConfig::load_with_defaults();
        assert_eq!(config.tick_ms, 100);
        if dirs::data_dir().is_some() {
            assert!(config.rules_directory.ends_with("rules"));
        }
    }

    #[test]
    fn rules_directory_must_exist() {
        let mut config = AppConfig::default();
        let missing = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("no-such-directory");
        assert!(matches!(
            config.set_rules_directory(missing),
            Err(ConfigError::MissingRulesDirectory { .. })
        ));

        let fixtures = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures");
        config.set_rules_directory(fixtures.clone()).expect("fixtures exist");
        assert_eq!(PathBuf::from(&config.rules_directory), fixtures);
    }

    #[test]
    fn zero_tick_rejected() {
        let mut config = AppConfig::default();
        assert!(matches!(config.set_tick_ms(0), Err(ConfigError::InvalidTick)));
        config.set_tick_ms(50).expect("valid tick");
        assert_eq!(config.tick_ms, 50);
    }

    #[test]
    fn engine_section_defaults_when_missing() {
        let config: AppConfig = toml::from_str("rules_directory = \"/tmp/rules\"").expect("valid toml");
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.tick_ms, 100);
    }
}
