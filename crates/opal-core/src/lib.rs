pub mod ast;
pub mod collections;
pub mod config;
pub mod context;
pub mod conversions;
pub mod diagnostics;
pub mod error;
pub mod registry;
pub mod span;
pub mod types;

// Re-export commonly used items for convenience
pub use tracing;

pub use context::Compilation;
pub use error::{Error, Result};
pub use span::{FileId, Span};
pub use types::Ty;
