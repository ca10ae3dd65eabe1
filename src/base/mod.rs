//! Foundation types for the calculation toolchain.
//!
//! This module provides fundamental types used throughout the crate:
//! - [`TextRange`], [`TextSize`] - Source positions (byte offsets)
//! - [`LineIndex`] - Offset to line/column conversion
//! - [`Position`], [`Span`] - Line/column positions for editor-facing output
//! - [`DocumentUri`] - Opaque document identifier supplied by the sync layer
//!
//! This module has NO dependencies on other crate modules.

mod line_index;
mod position;
mod uri;

pub use line_index::LineIndex;
pub use position::{Position, Span};
pub use uri::DocumentUri;

// Re-export text-size types for convenience
pub use text_size;
pub use text_size::{TextRange, TextSize};
