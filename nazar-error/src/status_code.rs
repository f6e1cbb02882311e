use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "strum")]
use strum_macros::{AsRefStr, EnumIter};

/// Коды статуса для категоризации ошибок хаба.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 2xxx: Ошибки конфигурации
/// - 9xxx: Ошибки диспетчеризации сообщений
///
/// `num_enum::TryFromPrimitive` даёт реализацию `TryFrom<u32>`, чтобы код
/// можно было восстановить из числового значения (например, из метрик).
#[cfg_attr(feature = "strum", derive(AsRefStr, EnumIter))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Unsupported = 1001,
    Unexpected = 1002,
    Internal = 1003,
    InvalidArgs = 1004,

    // === 2xxx: Конфигурация ===
    ConfigLoadFailed = 2000,
    ConfigInvalid = 2001,
    LoggingInitFailed = 2002,

    // === 9xxx: Диспетчеризация ===
    DispatchDepthExceeded = 9000,
    HandlerPanicked = 9001,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Пытается получить вариант `StatusCode` из `u32`.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Вернёт `true`, если переданный `code` означает успешный результат.
    pub fn is_success(code: u32) -> bool {
        Self::Success as u32 == code
    }

    /// Ошибка вызвана неверными входными данными или настройками
    /// (исправляется на стороне вызывающего кода).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgs | Self::ConfigInvalid | Self::ConfigLoadFailed
        )
    }

    /// Ошибка возникла при доставке сообщения подписчикам (диапазон 9xxx).
    pub fn is_dispatch_error(&self) -> bool {
        (9000..=9999).contains(&self.code())
    }

    /// Требуется ли логировать как критическую ошибку.
    ///
    /// Превышение глубины диспетчеризации почти всегда означает два
    /// перекрёстно связанных хаба, публикующих друг в друга бесконечно.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Internal | Self::DispatchDepthExceeded)
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::InvalidArgs | Self::ConfigInvalid | Self::ConfigLoadFailed => LogLevel::Info,
            Self::HandlerPanicked | Self::LoggingInitFailed => LogLevel::Warn,
            Self::Internal | Self::DispatchDepthExceeded => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        #[cfg(feature = "strum")]
        {
            write!(f, "{} ({})", self.as_ref(), self.code())
        }
        #[cfg(not(feature = "strum"))]
        {
            write!(f, "{:?} ({})", self, self.code())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
