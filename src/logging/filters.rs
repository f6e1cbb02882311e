use tracing_subscriber::EnvFilter;

use super::{LoggingConfig, LoggingError};

/// `RUST_LOG`, если задана, иначе директива из конфигурации.
pub(crate) fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| LoggingError::InvalidDirective {
            directive: config.level.clone(),
            reason: e.to_string(),
        }),
    }
}
