/// Process settings: hub dispatch parameters and logging, loaded from
/// defaults and `NAZAR_*` environment variables.
pub mod config;
/// Typed publish/subscribe hub: messages, handlers, registry, dispatch.
pub mod hub;
/// `tracing` subscriber setup (filters, formats).
pub mod logging;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Configuration.
pub use config::{HubConfig, Settings};
/// Hub API: the hub itself, handlers, reports and role façades.
pub use hub::{
    DispatchReport, Handler, HandlerId, Hub, HubBuilder, HubStats, Hubs, Message, OwnerKey,
    PipelineFactory, Publisher, Subscriber, TypeKey,
};
/// Logging initialization.
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingError};
/// Error types shared with `nazar-error`.
pub use nazar_error::{ErrorExt, HubError, SettingsError, StatusCode};
