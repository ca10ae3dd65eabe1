//! Request debouncing
//!
//! Requests are keyed by document and class. Scheduling a request that is
//! already pending replaces it, so only the latest version survives the quiet
//! period. The debouncer never sleeps; callers pass `now` and poll for due
//! requests, which keeps it deterministic under test.

use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use super::config::{DebounceConfig, RequestClass};
use crate::base::DocumentUri;

/// A request whose quiet period has elapsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadyRequest {
    pub uri: DocumentUri,
    pub class: RequestClass,
    pub version: i32,
}

#[derive(Clone, Copy, Debug)]
struct Pending {
    version: i32,
    due: Instant,
}

#[derive(Debug, Default)]
pub struct RequestDebouncer {
    delays: DebounceConfig,
    pending: FxHashMap<(DocumentUri, RequestClass), Pending>,
}

impl RequestDebouncer {
    pub fn new(delays: DebounceConfig) -> Self {
        Self {
            delays,
            pending: FxHashMap::default(),
        }
    }

    pub fn delays(&self) -> DebounceConfig {
        self.delays
    }

    /// New delays apply to requests scheduled from now on.
    pub fn set_delays(&mut self, delays: DebounceConfig) {
        self.delays = delays;
    }

    pub fn delay(&self, class: RequestClass) -> Duration {
        self.delays.delay(class)
    }

    /// Schedule `class` for `uri` at `version`, restarting its quiet period.
    ///
    /// An older version never replaces a newer pending one.
    pub fn schedule(&mut self, uri: DocumentUri, class: RequestClass, version: i32, now: Instant) {
        let due = now + self.delays.delay(class);
        let pending = self
            .pending
            .entry((uri, class))
            .or_insert(Pending { version, due });
        if version >= pending.version {
            *pending = Pending { version, due };
        }
    }

    pub fn cancel(&mut self, uri: &DocumentUri, class: RequestClass) -> bool {
        self.pending.remove(&(uri.clone(), class)).is_some()
    }

    /// Drop every pending request for `uri`, e.g. when it is closed
    pub fn cancel_document(&mut self, uri: &DocumentUri) -> usize {
        let before = self.pending.len();
        self.pending.retain(|(pending_uri, _), _| pending_uri != uri);
        before - self.pending.len()
    }

    /// Remove and return every request due at `now`.
    ///
    /// Higher-priority classes come first; within a class, the earliest due.
    pub fn poll(&mut self, now: Instant) -> Vec<ReadyRequest> {
        let mut ready: Vec<(Instant, ReadyRequest)> = Vec::new();
        self.pending.retain(|(uri, class), pending| {
            if pending.due > now {
                return true;
            }
            ready.push((
                pending.due,
                ReadyRequest {
                    uri: uri.clone(),
                    class: *class,
                    version: pending.version,
                },
            ));
            false
        });
        ready.sort_by(|(a_due, a), (b_due, b)| {
            a.class
                .cmp(&b.class)
                .then(a_due.cmp(b_due))
                .then_with(|| a.uri.cmp(&b.uri))
        });
        if !ready.is_empty() {
            tracing::trace!(count = ready.len(), "debounced requests ready");
        }
        ready.into_iter().map(|(_, request)| request).collect()
    }

    /// Earliest instant at which [`poll`](Self::poll) will return something
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|pending| pending.due).min()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, uri: &DocumentUri, class: RequestClass) -> bool {
        self.pending.contains_key(&(uri.clone(), class))
    }
}
