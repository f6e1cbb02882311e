use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибки загрузки и проверки настроек.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// Источник настроек не удалось прочитать или десериализовать.
    Load { reason: String },
    /// Значение поля недопустимо.
    Invalid { field: &'static str, reason: String },
}

impl std::fmt::Display for SettingsError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::Load { reason } => write!(f, "Failed to load settings: {reason}"),
            Self::Invalid { field, reason } => {
                write!(f, "Invalid setting '{field}': {reason}")
            }
        }
    }
}

impl std::error::Error for SettingsError {}

impl ErrorExt for SettingsError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Load { .. } => StatusCode::ConfigLoadFailed,
            Self::Invalid { .. } => StatusCode::ConfigInvalid,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
