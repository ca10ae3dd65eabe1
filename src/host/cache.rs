//! Document cache
//!
//! One entry per URI, evicted least-recently-used first once either the
//! entry limit or the memory ceiling is exceeded. The most recently edited
//! document is pinned and never evicted.

use std::sync::Arc;
use std::time::Instant;

use lru::LruCache;

use crate::base::DocumentUri;
use crate::syntax::ParseResult;

/// Cached analysis of one document version.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub version: i32,
    /// Text the result was parsed from; the diff baseline for the next edit
    pub text: Arc<str>,
    pub result: Arc<ParseResult>,
    pub last_access: Instant,
    pub approx_memory_bytes: usize,
}

impl CacheEntry {
    pub fn new(version: i32, text: Arc<str>, result: Arc<ParseResult>) -> Self {
        let approx_memory_bytes = text.len() + result.approx_memory_bytes();
        Self {
            version,
            text,
            result,
            last_access: Instant::now(),
            approx_memory_bytes,
        }
    }
}

pub struct DocumentCache {
    entries: LruCache<DocumentUri, CacheEntry>,
    max_entries: usize,
    max_memory_bytes: usize,
    memory_bytes: usize,
    /// Most recently edited document
    pinned: Option<DocumentUri>,
}

impl DocumentCache {
    pub fn new(max_entries: usize, max_memory_bytes: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            max_entries: max_entries.max(1),
            max_memory_bytes,
            memory_bytes: 0,
            pinned: None,
        }
    }

    /// Entry for `uri`, marking it recently used
    pub fn get(&mut self, uri: &DocumentUri) -> Option<&CacheEntry> {
        let entry = self.entries.get_mut(uri)?;
        entry.last_access = Instant::now();
        Some(entry)
    }

    /// Entry for `uri` only if it is at exactly `version`; a stale version is a miss
    pub fn get_at(&mut self, uri: &DocumentUri, version: i32) -> Option<&CacheEntry> {
        self.get(uri).filter(|entry| entry.version == version)
    }

    /// Entry for `uri` without touching recency
    pub fn peek(&self, uri: &DocumentUri) -> Option<&CacheEntry> {
        self.entries.peek(uri)
    }

    /// Store the latest analysis of `uri`, pin it, and evict as needed.
    ///
    /// Returns the evicted URIs.
    pub fn insert(&mut self, uri: DocumentUri, entry: CacheEntry) -> Vec<DocumentUri> {
        self.memory_bytes += entry.approx_memory_bytes;
        if let Some(old) = self.entries.put(uri.clone(), entry) {
            self.memory_bytes -= old.approx_memory_bytes;
        }
        self.pinned = Some(uri);
        self.evict()
    }

    pub fn remove(&mut self, uri: &DocumentUri) -> Option<CacheEntry> {
        let entry = self.entries.pop(uri)?;
        self.memory_bytes -= entry.approx_memory_bytes;
        if self.pinned.as_ref() == Some(uri) {
            self.pinned = None;
        }
        Some(entry)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.memory_bytes = 0;
        self.pinned = None;
    }

    /// Change the limits, evicting immediately if they shrank
    pub fn set_limits(&mut self, max_entries: usize, max_memory_bytes: usize) -> Vec<DocumentUri> {
        self.max_entries = max_entries.max(1);
        self.max_memory_bytes = max_memory_bytes;
        self.evict()
    }

    fn over_limit(&self) -> bool {
        self.entries.len() > self.max_entries || self.memory_bytes > self.max_memory_bytes
    }

    fn evict(&mut self) -> Vec<DocumentUri> {
        let mut evicted = Vec::new();
        while self.over_limit() {
            let victim = self
                .entries
                .iter()
                .rev()
                .map(|(uri, _)| uri)
                .find(|uri| self.pinned.as_ref() != Some(*uri))
                .cloned();
            let Some(victim) = victim else {
                break;
            };
            if let Some(entry) = self.entries.pop(&victim) {
                self.memory_bytes -= entry.approx_memory_bytes;
                tracing::debug!(
                    uri = %victim,
                    bytes = entry.approx_memory_bytes,
                    total = self.memory_bytes,
                    "evicted cached document"
                );
            }
            evicted.push(victim);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, uri: &DocumentUri) -> bool {
        self.entries.contains(uri)
    }

    pub fn memory_bytes(&self) -> usize {
        self.memory_bytes
    }

    pub fn pinned(&self) -> Option<&DocumentUri> {
        self.pinned.as_ref()
    }
}
