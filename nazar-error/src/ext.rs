use std::{any::Any, error::Error};

use crate::StatusCode;

/// Расширение для ошибок хаба (object-safe).
///
/// Даёт единый способ получить статус-код, безопасное сообщение для
/// пользователя, подробное сообщение для логов и теги для метрик.
pub trait ErrorExt: Error + Send + Sync + 'static {
    /// Статус ошибки.
    ///
    /// По умолчанию возвращает [`StatusCode::Internal`].
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }

    /// Возвращает ошибку как [`Any`](std::any::Any) для downcast.
    fn as_any(&self) -> &dyn Any;

    /// Сообщение без внутренних деталей.
    ///
    /// Для внутренних ошибок возвращает `"Internal error"`.
    fn client_message(&self) -> String {
        match self.status_code() {
            StatusCode::Unknown | StatusCode::Internal | StatusCode::Unexpected => {
                "Internal error".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Детализированное сообщение для логов.
    fn log_message(&self) -> String {
        format!("{self:?}")
    }

    /// Набор тегов для систем наблюдаемости.
    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        vec![
            ("error_type", self.type_name()),
            ("status_code", self.status_code().to_string()),
        ]
    }

    /// Короткое имя типа ошибки.
    fn type_name(&self) -> String {
        std::any::type_name::<Self>()
            .split("::")
            .last()
            .unwrap_or("Unknown")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use super::*;

    #[derive(Debug)]
    struct PlainError(&'static str);

    impl fmt::Display for PlainError {
        fn fmt(
            &self,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            write!(f, "PlainError: {}", self.0)
        }
    }

    impl Error for PlainError {}

    impl ErrorExt for PlainError {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Тест проверяет значения по умолчанию: Internal и скрытое сообщение.
    #[test]
    fn test_defaults_hide_internal_details() {
        let err = PlainError("secret");
        assert_eq!(err.status_code(), StatusCode::Internal);
        assert_eq!(err.client_message(), "Internal error");
        assert!(err.log_message().contains("secret"));
    }

    /// Тест проверяет, что теги метрик содержат имя типа и код.
    #[test]
    fn test_metrics_tags() {
        let tags = PlainError("x").metrics_tags();
        assert!(tags.contains(&("error_type", "PlainError".to_string())));
        assert!(tags.iter().any(|(k, v)| *k == "status_code" && v.contains("1003")));
    }
}
