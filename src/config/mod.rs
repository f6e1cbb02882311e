//! Настройки хаба и логирования.
//!
//! - `hub`: [`HubConfig`], параметры диспетчеризации одного хаба.
//! - `settings`: [`Settings`], загрузка всех настроек процесса из значений
//!   по умолчанию и переменных окружения `NAZAR_*`.

pub mod hub;
pub mod settings;

pub use hub::{HubConfig, DEFAULT_MAX_DISPATCH_DEPTH};
pub use settings::{Settings, ENV_PREFIX};
