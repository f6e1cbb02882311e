use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use super::LoggingError;

/// Формат вывода событий.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Одна строка на событие.
    #[default]
    Compact,
    /// Многострочный вывод для разработки.
    Pretty,
    /// JSON, по объекту на строку.
    Json,
}

/// Конфигурация логирования.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Директива `EnvFilter` (`"info"`, `"nazar=debug,warn"`). Переменная
    /// `RUST_LOG`, если задана, имеет приоритет.
    pub level: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_line_numbers: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
            with_line_numbers: false,
        }
    }
}

impl LoggingConfig {
    /// Проверяет, что директива разбирается `EnvFilter`.
    pub fn validate(&self) -> Result<(), LoggingError> {
        EnvFilter::try_new(&self.level)
            .map(drop)
            .map_err(|e| LoggingError::InvalidDirective {
                directive: self.level.clone(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет значения по умолчанию.
    #[test]
    fn test_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Compact);
        assert!(config.with_ansi);
        assert!(config.validate().is_ok());
    }

    /// Тест проверяет разбор формата из строки в нижнем регистре.
    #[test]
    fn test_format_deserialize() {
        let format: LogFormat = serde_json::from_str("\"pretty\"").unwrap();
        assert_eq!(format, LogFormat::Pretty);
        assert!(serde_json::from_str::<LogFormat>("\"Pretty\"").is_err());
    }

    /// Тест проверяет отказ для некорректной директивы.
    #[test]
    fn test_invalid_directive() {
        let config = LoggingConfig {
            level: "nazar=loud".to_string(),
            ..LoggingConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, LoggingError::InvalidDirective { .. }));
    }
}
