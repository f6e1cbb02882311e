use std::io::{self, Stdout};

use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::Layer as LayerTrait,
    registry::LookupSpan,
};

use super::{LogFormat, LoggingConfig};

/// fmt-слой для stdout в формате из конфигурации.
pub(crate) fn build_formatter<S>(config: &LoggingConfig) -> Box<dyn LayerTrait<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let writer: fn() -> Stdout = io::stdout;
    build_formatter_with_writer(config, writer)
}

/// Возвращаем boxed trait-объект, чтобы стереть конкретный тип формата
/// (json/pretty/compact).
pub(crate) fn build_formatter_with_writer<S, W>(
    config: &LoggingConfig,
    writer: W,
) -> Box<dyn LayerTrait<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(config.with_target)
        .with_thread_ids(config.with_thread_ids)
        .with_line_number(config.with_line_numbers);

    match config.format {
        // JSON не раскрашивается.
        LogFormat::Json => Box::new(layer.with_ansi(false).json().with_current_span(true)),
        LogFormat::Pretty => Box::new(layer.with_ansi(config.with_ansi).pretty()),
        LogFormat::Compact => Box::new(layer.with_ansi(config.with_ansi).compact()),
    }
}
