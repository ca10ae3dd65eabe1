//! Published diagnostics.
//!
//! Each publication replaces the previous set for its document. A set for an
//! older version than the one already published is ignored.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::base::DocumentUri;
use crate::semantic::Diagnostic;

/// The diagnostics currently shown for one document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedDiagnostics {
    pub version: i32,
    pub diagnostics: Arc<[Diagnostic]>,
}

#[derive(Debug, Default)]
pub struct DiagnosticStore {
    published: RwLock<FxHashMap<DocumentUri, PublishedDiagnostics>>,
}

impl DiagnosticStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the diagnostics of `uri`. Returns false if `version` is stale.
    pub fn publish(&self, uri: &DocumentUri, version: i32, diagnostics: Vec<Diagnostic>) -> bool {
        let mut published = self.published.write();
        if let Some(current) = published.get(uri)
            && current.version > version
        {
            tracing::debug!(%uri, version, current = current.version, "ignoring stale diagnostics");
            return false;
        }
        published.insert(
            uri.clone(),
            PublishedDiagnostics {
                version,
                diagnostics: diagnostics.into(),
            },
        );
        true
    }

    pub fn get(&self, uri: &DocumentUri) -> Option<PublishedDiagnostics> {
        self.published.read().get(uri).cloned()
    }

    pub fn clear(&self, uri: &DocumentUri) -> Option<PublishedDiagnostics> {
        self.published.write().remove(uri)
    }

    pub fn clear_all(&self) {
        self.published.write().clear();
    }

    pub fn len(&self) -> usize {
        self.published.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.published.read().is_empty()
    }
}
