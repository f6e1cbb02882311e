use nazar_error::SettingsError;
use serde::{Deserialize, Serialize};

/// Лимит вложенности `publish` на потоке по умолчанию.
pub const DEFAULT_MAX_DISPATCH_DEPTH: usize = 64;

/// Параметры диспетчеризации хаба.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Сколько публикаций может быть вложено друг в друга на одном потоке
    /// (обработчик публикует, его подписчик публикует и т.д.).
    pub max_dispatch_depth: usize,
    /// Паника обработчика не прерывает доставку остальным. При `false`
    /// первая паника пробрасывается издателю.
    pub isolate_panics: bool,
    /// `trace!` на каждый вызов обработчика.
    pub log_dispatch: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_dispatch_depth: DEFAULT_MAX_DISPATCH_DEPTH,
            isolate_panics: true,
            log_dispatch: false,
        }
    }
}

impl HubConfig {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_dispatch_depth == 0 {
            return Err(SettingsError::Invalid {
                field: "max_dispatch_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
