//! Host services: document cache, request debouncing, diagnostics
//! publication and the [`AnalysisHost`] that ties them together.

mod analysis;
mod cache;
mod config;
mod debounce;
mod error;
mod publish;

pub use analysis::{AnalysisHost, DocumentUpdate};
pub use cache::{CacheEntry, DocumentCache};
pub use config::{AnalysisConfig, DebounceConfig, RequestClass};
pub use debounce::{ReadyRequest, RequestDebouncer};
pub use error::AnalysisError;
pub use publish::{DiagnosticStore, PublishedDiagnostics};
