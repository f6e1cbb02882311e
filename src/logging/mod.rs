//! Логирование на базе `tracing`.
//!
//! Хаб пишет события через макросы `tracing` и сам подписчик не
//! устанавливает. Приложение вызывает [`init_logging`] один раз при старте.

pub mod config;
mod filters;
mod formatter;

use std::any::Any;

pub use config::{LogFormat, LoggingConfig};
use nazar_error::{ErrorExt, StatusCode};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Ошибки инициализации логирования.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },
    #[error("global tracing subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

impl ErrorExt for LoggingError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidDirective { .. } => StatusCode::ConfigInvalid,
            Self::AlreadyInitialized(_) => StatusCode::LoggingInitFailed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Устанавливает глобальный подписчик `tracing`: `EnvFilter` плюс fmt-слой.
pub fn init_logging(config: LoggingConfig) -> Result<(), LoggingError> {
    let env_filter = filters::build_filter(&config)?;
    let fmt_layer = formatter::build_formatter(&config);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.level,
        format = ?config.format,
        "Logging system initialized"
    );
    Ok(())
}
