//! Parser error handling module
//!
//! This module provides error handling for the calculation parser:
//! - Categorized error codes for filtering and de-duplication
//! - Context-aware error messages
//! - Recovery actions for common mistakes
//! - Related span tracking (e.g., "IF opened here" for a missing END)

mod codes;
mod context;
mod error;

pub use codes::ErrorCode;
pub use context::ParseContext;
pub use error::{ParseError, ParseErrorBuilder, RelatedInfo, Severity, format_context_error};
pub(crate) use error::shift_range;

#[cfg(test)]
mod tests;
