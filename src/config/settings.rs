use config::{Config, ConfigError, Environment};
use nazar_error::SettingsError;
use serde::{Deserialize, Serialize};

use super::HubConfig;
use crate::logging::LoggingConfig;

/// Префикс переменных окружения: `NAZAR_HUB__MAX_DISPATCH_DEPTH`,
/// `NAZAR_LOGGING__LEVEL` и т.д.
pub const ENV_PREFIX: &str = "NAZAR";

/// Настройки процесса.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub hub: HubConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Значения по умолчанию, поверх которых накладываются переменные
    /// окружения с префиксом `NAZAR_`.
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_with_prefix(ENV_PREFIX)
    }

    pub fn load_with_prefix(prefix: &str) -> Result<Self, SettingsError> {
        let settings: Settings = build(prefix)
            .and_then(Config::try_deserialize)
            .map_err(|e| SettingsError::Load {
                reason: e.to_string(),
            })?;
        settings.hub.validate()?;
        settings
            .logging
            .validate()
            .map_err(|e| SettingsError::Invalid {
                field: "logging.level",
                reason: e.to_string(),
            })?;
        Ok(settings)
    }
}

fn build(prefix: &str) -> Result<Config, ConfigError> {
    let defaults = HubConfig::default();
    Config::builder()
        // Значения по умолчанию
        .set_default("hub.max_dispatch_depth", defaults.max_dispatch_depth as u64)?
        .set_default("hub.isolate_panics", defaults.isolate_panics)?
        .set_default("hub.log_dispatch", defaults.log_dispatch)?
        // Переменные окружения: PREFIX_SECTION__KEY
        .add_source(
            Environment::with_prefix(prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
}
