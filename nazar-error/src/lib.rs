pub mod ext;
pub mod status_code;
pub mod types;

// Publicly re-export all error types and helpers from the submodules so the
// hub crate can reach them through a single path.
pub use ext::*;
pub use status_code::*;
pub use types::*;
