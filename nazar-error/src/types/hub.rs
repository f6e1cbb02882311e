use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибки диспетчеризации сообщений хаба.
///
/// Отсутствие подписчиков и отписка несуществующего обработчика ошибками
/// не считаются и сюда не попадают.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// Вложенные `publish` на одном потоке превысили лимит глубины.
    DispatchDepthExceeded { depth: usize, limit: usize },
    /// Обработчик запаниковал во время доставки сообщения.
    HandlerPanicked {
        message_type: &'static str,
        handler_id: u64,
        reason: String,
    },
}

impl std::fmt::Display for HubError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::DispatchDepthExceeded { depth, limit } => write!(
                f,
                "Dispatch depth {depth} exceeds limit {limit} (reentrant publish loop?)"
            ),
            Self::HandlerPanicked {
                message_type,
                handler_id,
                reason,
            } => write!(
                f,
                "Handler #{handler_id} for {message_type} panicked: {reason}"
            ),
        }
    }
}

impl std::error::Error for HubError {}

impl ErrorExt for HubError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::DispatchDepthExceeded { .. } => StatusCode::DispatchDepthExceeded,
            Self::HandlerPanicked { .. } => StatusCode::HandlerPanicked,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::DispatchDepthExceeded { limit, .. } => {
                format!("Publish nesting limit ({limit}) reached")
            }
            Self::HandlerPanicked { message_type, .. } => {
                format!("A subscriber for {message_type} failed")
            }
        }
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "hub_dispatch".to_string()),
            ("status_code", self.status_code().to_string()),
        ];

        match self {
            Self::DispatchDepthExceeded { limit, .. } => {
                tags.push(("limit", limit.to_string()));
            }
            Self::HandlerPanicked { message_type, .. } => {
                tags.push(("message_type", (*message_type).to_string()));
            }
        }

        tags
    }
}
