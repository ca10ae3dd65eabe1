//! AnalysisHost: the service that owns per-document analysis state.
//!
//! ## Usage
//!
//! ```ignore
//! let host = AnalysisHost::new(AnalysisConfig::default());
//!
//! let result = host.update("calc://sales".into(), 1, "SUM([Sales])")?;
//! let published = host.diagnostics(&"calc://sales".into());
//!
//! host.shutdown();
//! ```
//!
//! Updates to one document are serialized; updates to different documents
//! may run in parallel. Every update carries the editor's version number and
//! an update that is no longer the newest for its document is dropped,
//! either up front or as soon as the parser notices its cancellation.

use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

use super::cache::{CacheEntry, DocumentCache};
use super::config::{AnalysisConfig, RequestClass};
use super::debounce::{ReadyRequest, RequestDebouncer};
use super::publish::{DiagnosticStore, PublishedDiagnostics};
use super::AnalysisError;
use crate::base::DocumentUri;
use crate::incremental::IncrementalParser;
use crate::parser::{ParseOptions, parse_document_cancellable};
use crate::semantic::{Diagnostic, SignatureTable, validate};
use crate::syntax::ParseResult;

/// A single document update, as received from the editor.
#[derive(Clone, Debug)]
pub struct DocumentUpdate {
    pub uri: DocumentUri,
    pub version: i32,
    pub text: Arc<str>,
}

impl DocumentUpdate {
    pub fn new(uri: impl Into<DocumentUri>, version: i32, text: impl Into<Arc<str>>) -> Self {
        Self {
            uri: uri.into(),
            version,
            text: text.into(),
        }
    }
}

struct SlotState {
    latest: Option<i32>,
    cancel: CancellationToken,
}

/// Per-document coordination: the writer lock and the version watermark.
struct DocumentSlot {
    write: Mutex<()>,
    state: Mutex<SlotState>,
}

impl DocumentSlot {
    fn new(cancel: CancellationToken) -> Self {
        Self {
            write: Mutex::new(()),
            state: Mutex::new(SlotState {
                latest: None,
                cancel,
            }),
        }
    }
}

/// Owns the document cache, published diagnostics and request debouncer.
///
/// All methods take `&self`; share the host behind an `Arc`.
pub struct AnalysisHost {
    config: RwLock<AnalysisConfig>,
    signatures: RwLock<Arc<SignatureTable>>,
    cache: Mutex<DocumentCache>,
    slots: Mutex<FxHashMap<DocumentUri, Arc<DocumentSlot>>>,
    published: DiagnosticStore,
    debouncer: Mutex<RequestDebouncer>,
    shutdown: CancellationToken,
}

impl Default for AnalysisHost {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl AnalysisHost {
    pub fn new(config: AnalysisConfig) -> Self {
        Self::with_signatures(config, SignatureTable::shared_builtin())
    }

    pub fn with_signatures(config: AnalysisConfig, signatures: Arc<SignatureTable>) -> Self {
        let cache = DocumentCache::new(config.max_cache_entries, config.max_cache_memory_bytes());
        let debouncer = RequestDebouncer::new(config.debounce_delay_ms);
        Self {
            config: RwLock::new(config),
            signatures: RwLock::new(signatures),
            cache: Mutex::new(cache),
            slots: Mutex::new(FxHashMap::default()),
            published: DiagnosticStore::new(),
            debouncer: Mutex::new(debouncer),
            shutdown: CancellationToken::new(),
        }
    }

    // ========================================================================
    // UPDATES
    // ========================================================================

    /// Analyze `text` as `version` of `uri`, cache the result and publish
    /// its diagnostics.
    ///
    /// The previous cached version, if any, is the baseline for an
    /// incremental reparse.
    pub fn update(
        &self,
        uri: DocumentUri,
        version: i32,
        text: impl Into<Arc<str>>,
    ) -> Result<Arc<ParseResult>, AnalysisError> {
        if self.shutdown.is_cancelled() {
            return Err(AnalysisError::ShutDown);
        }
        let text = text.into();
        let slot = self.slot(&uri);
        let cancel = self.claim(&slot, &uri, version)?;

        let _writer = slot.write.lock();
        let superseded = || {
            if self.shutdown.is_cancelled() {
                AnalysisError::ShutDown
            } else {
                AnalysisError::Superseded {
                    uri: uri.clone(),
                    version,
                }
            }
        };
        if cancel.is_cancelled() {
            return Err(superseded());
        }

        let started = Instant::now();
        let (parser, validation) = {
            let config = self.config.read();
            let options = ParseOptions::with_signatures(self.signatures.read().clone());
            (
                IncrementalParser::new(options, config.incremental_parsing_line_threshold),
                config.validation_options(),
            )
        };
        let baseline = self.cache.lock().peek(&uri).cloned();

        let parsed = match &baseline {
            Some(previous) => {
                parser.reparse_cancellable(&previous.text, &previous.result, &text, &cancel)
            }
            None => parse_document_cancellable(&text, parser.options(), &cancel),
        };
        let Some(mut result) = parsed else {
            return Err(superseded());
        };

        let diagnostics = validate(&result, &parser.options().signatures, validation);
        result.diagnostics = diagnostics.clone();
        let result = Arc::new(result);

        let Some(evicted) = self.commit(&uri, version, text, result.clone(), diagnostics, &cancel)
        else {
            return Err(superseded());
        };

        tracing::debug!(
            %uri,
            version,
            incremental = baseline.is_some(),
            diagnostics = result.diagnostics.len(),
            evicted = evicted.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "analyzed document"
        );
        Ok(result)
    }

    /// Cache and publish a finished analysis unless `cancel` fired.
    ///
    /// `close` cancels before it clears, so checking under the cache lock
    /// keeps a closed document from coming back.
    fn commit(
        &self,
        uri: &DocumentUri,
        version: i32,
        text: Arc<str>,
        result: Arc<ParseResult>,
        diagnostics: Vec<Diagnostic>,
        cancel: &CancellationToken,
    ) -> Option<Vec<DocumentUri>> {
        let mut cache = self.cache.lock();
        if cancel.is_cancelled() {
            return None;
        }
        let evicted = cache.insert(uri.clone(), CacheEntry::new(version, text, result));
        self.published.publish(uri, version, diagnostics);
        Some(evicted)
    }

    /// Apply a batch of updates. Documents are processed in parallel, and
    /// the updates of one document in the order given.
    pub fn update_many(
        &self,
        updates: Vec<DocumentUpdate>,
    ) -> Vec<(DocumentUri, i32, Result<Arc<ParseResult>, AnalysisError>)> {
        let mut groups: IndexMap<DocumentUri, Vec<DocumentUpdate>> = IndexMap::new();
        for update in updates {
            groups.entry(update.uri.clone()).or_default().push(update);
        }
        let groups: Vec<Vec<DocumentUpdate>> = groups.into_values().collect();

        let outcomes: Vec<Vec<_>> = groups
            .into_par_iter()
            .map(|group| {
                group
                    .into_iter()
                    .map(|update| {
                        let outcome = self.update(update.uri.clone(), update.version, update.text);
                        (update.uri, update.version, outcome)
                    })
                    .collect()
            })
            .collect();
        outcomes.into_iter().flatten().collect()
    }

    /// Forget `uri`: cancel in-flight work, drop its cache entry, published
    /// diagnostics and pending requests.
    pub fn close(&self, uri: &DocumentUri) {
        if let Some(slot) = self.slots.lock().remove(uri) {
            slot.state.lock().cancel.cancel();
        }
        {
            let mut cache = self.cache.lock();
            cache.remove(uri);
            self.published.clear(uri);
        }
        self.debouncer.lock().cancel_document(uri);
        tracing::debug!(%uri, "closed document");
    }

    fn slot(&self, uri: &DocumentUri) -> Arc<DocumentSlot> {
        self.slots
            .lock()
            .entry(uri.clone())
            .or_insert_with(|| Arc::new(DocumentSlot::new(self.shutdown.child_token())))
            .clone()
    }

    /// Advance the version watermark and cancel the update it replaces.
    fn claim(
        &self,
        slot: &DocumentSlot,
        uri: &DocumentUri,
        version: i32,
    ) -> Result<CancellationToken, AnalysisError> {
        let mut state = slot.state.lock();
        if let Some(latest) = state.latest
            && version <= latest
        {
            tracing::warn!(%uri, latest, incoming = version, "rejecting out-of-order update");
            return Err(AnalysisError::OutOfOrder {
                uri: uri.clone(),
                latest,
                incoming: version,
            });
        }
        state.latest = Some(version);
        state.cancel.cancel();
        state.cancel = self.shutdown.child_token();
        Ok(state.cancel.clone())
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Latest cached result for `uri`
    pub fn result(&self, uri: &DocumentUri) -> Option<Arc<ParseResult>> {
        self.cache.lock().get(uri).map(|entry| entry.result.clone())
    }

    /// Cached result for `uri` only if it is at `version`
    pub fn result_at(&self, uri: &DocumentUri, version: i32) -> Option<Arc<ParseResult>> {
        self.cache
            .lock()
            .get_at(uri, version)
            .map(|entry| entry.result.clone())
    }

    pub fn diagnostics(&self, uri: &DocumentUri) -> Option<PublishedDiagnostics> {
        self.published.get(uri)
    }

    /// Newest version accepted for `uri`
    pub fn latest_version(&self, uri: &DocumentUri) -> Option<i32> {
        let slot = self.slots.lock().get(uri).cloned()?;
        let latest = slot.state.lock().latest;
        latest
    }

    pub fn cached_documents(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn cache_memory_bytes(&self) -> usize {
        self.cache.lock().memory_bytes()
    }

    // ========================================================================
    // REQUESTS
    // ========================================================================

    /// Debounce a request for `uri` at `version`
    pub fn schedule(&self, uri: DocumentUri, class: RequestClass, version: i32, now: Instant) {
        self.debouncer.lock().schedule(uri, class, version, now);
    }

    /// Requests due at `now`, dropping any overtaken by a newer update
    pub fn ready_requests(&self, now: Instant) -> Vec<ReadyRequest> {
        let ready = self.debouncer.lock().poll(now);
        ready
            .into_iter()
            .filter(|request| {
                self.latest_version(&request.uri)
                    .is_none_or(|latest| request.version >= latest)
            })
            .collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.lock().next_deadline()
    }

    // ========================================================================
    // CONFIGURATION
    // ========================================================================

    pub fn config(&self) -> AnalysisConfig {
        self.config.read().clone()
    }

    /// Replace the configuration. Cache limits and debounce delays apply
    /// immediately; parse settings apply from the next update.
    pub fn set_config(&self, config: AnalysisConfig) -> Result<(), AnalysisError> {
        config.validate()?;
        let evicted = self
            .cache
            .lock()
            .set_limits(config.max_cache_entries, config.max_cache_memory_bytes());
        self.debouncer.lock().set_delays(config.debounce_delay_ms);
        tracing::debug!(evicted = evicted.len(), "configuration updated");
        *self.config.write() = config;
        Ok(())
    }

    pub fn signatures(&self) -> Arc<SignatureTable> {
        self.signatures.read().clone()
    }

    /// Swap the signature table. Cached trees were checked against the old
    /// table, so the cache is cleared and the next update parses in full.
    pub fn set_signatures(&self, signatures: Arc<SignatureTable>) {
        let mut current = self.signatures.write();
        *current = signatures;
        self.cache.lock().clear();
        tracing::debug!(functions = current.len(), "signature table replaced");
    }

    /// Load custom signatures from JSON on top of the built-in table
    pub fn load_signatures_json(&self, json: &str) -> Result<(), AnalysisError> {
        let custom = SignatureTable::from_json_str(json)?;
        let merged = SignatureTable::builtin().merged(&custom);
        self.set_signatures(Arc::new(merged));
        Ok(())
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Cancel all in-flight work and release cached state.
    ///
    /// Later updates fail with [`AnalysisError::ShutDown`].
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.slots.lock().clear();
        {
            let mut cache = self.cache.lock();
            cache.clear();
            self.published.clear_all();
        }
        *self.debouncer.lock() = RequestDebouncer::new(self.config.read().debounce_delay_ms);
        tracing::debug!("analysis host shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
