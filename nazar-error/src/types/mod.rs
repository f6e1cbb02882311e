pub mod hub;
pub mod settings;

// Публичный экспорт всех типов ошибок из вложенных модулей.
pub use hub::*;
pub use settings::*;
