//! AnalysisHost: versioning, caching, publication and concurrency.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use calcls::host::{DocumentUpdate, RequestClass};
use calcls::parser::ErrorCode;
use calcls::{AnalysisConfig, AnalysisError, AnalysisHost, DocumentUri};

use crate::helpers::source_fixtures::{LARGE_DOCUMENT, NESTED_AGGREGATE, SIMPLE_AGGREGATE};

fn uri(name: &str) -> DocumentUri {
    DocumentUri::from(format!("calc://{}", name))
}

#[test]
fn test_incremental_update_uses_cached_baseline() {
    let host = AnalysisHost::default();
    let doc = uri("large");
    host.update(doc.clone(), 1, LARGE_DOCUMENT.as_str()).expect("analyzed");

    let edited = LARGE_DOCUMENT.replacen("SUM([Sales 0])", "SUM([Sales 0]) + AVG([Profit])", 1);
    let result = host.update(doc.clone(), 2, edited.as_str()).expect("analyzed");
    assert_eq!(result.changed_lines.as_ref().map(|l| l.len()), Some(1));

    let fresh = AnalysisHost::default()
        .update(doc, 1, edited.as_str())
        .expect("analyzed");
    assert_eq!(result.symbols, fresh.symbols);
    assert_eq!(result.diagnostics, fresh.diagnostics);
}

#[test]
fn test_diagnostics_follow_latest_version() {
    let host = AnalysisHost::default();
    let doc = uri("a");
    host.update(doc.clone(), 1, NESTED_AGGREGATE).expect("analyzed");
    let first = host.diagnostics(&doc).expect("published");
    assert_eq!(first.diagnostics.len(), 1);
    assert_eq!(first.diagnostics[0].code, ErrorCode::E0601);

    host.update(doc.clone(), 2, SIMPLE_AGGREGATE).expect("analyzed");
    let second = host.diagnostics(&doc).expect("published");
    assert_eq!(second.version, 2);
    assert!(second.diagnostics.is_empty());
}

#[test]
fn test_stale_update_is_rejected() {
    let host = AnalysisHost::default();
    let doc = uri("a");
    host.update(doc.clone(), 3, SIMPLE_AGGREGATE).expect("analyzed");
    for version in [3, 2] {
        let err = host.update(doc.clone(), version, NESTED_AGGREGATE).unwrap_err();
        assert!(err.is_stale());
    }
    assert_eq!(host.result(&doc).map(|r| r.symbols[0].name.to_string()), Some("SUM".to_string()));
}

#[test]
fn test_cache_limits_never_evict_latest_edit() {
    let config = AnalysisConfig {
        max_cache_entries: 2,
        ..AnalysisConfig::default()
    };
    let host = AnalysisHost::new(config);
    for name in ["a", "b", "c", "d"] {
        host.update(uri(name), 1, SIMPLE_AGGREGATE).expect("analyzed");
    }
    assert_eq!(host.cached_documents(), 2);
    assert!(host.result(&uri("d")).is_some());
    assert!(host.result(&uri("a")).is_none());

    let tiny = AnalysisConfig {
        max_cache_memory_mb: 0,
        ..AnalysisConfig::default()
    };
    host.set_config(tiny).expect("valid config");
    assert_eq!(host.cached_documents(), 1);
    assert!(host.result(&uri("d")).is_some());
}

#[test]
fn test_concurrent_updates_to_distinct_documents() {
    let host = Arc::new(AnalysisHost::default());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let host = Arc::clone(&host);
            thread::spawn(move || {
                for version in 1..=5 {
                    let text = format!("SUM([Field {}]) + {}", i, version);
                    host.update(uri(&i.to_string()), version, text).expect("analyzed");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker finished");
    }
    for i in 0..8 {
        let published = host.diagnostics(&uri(&i.to_string())).expect("published");
        assert_eq!(published.version, 5);
    }
}

#[test]
fn test_racing_updates_publish_newest() {
    let host = Arc::new(AnalysisHost::default());
    let doc = uri("shared");
    let handles: Vec<_> = (1..=16)
        .map(|version| {
            let host = Arc::clone(&host);
            let doc = doc.clone();
            thread::spawn(move || {
                let text = format!("{}\nSUM([v{}])", LARGE_DOCUMENT.as_str(), version);
                match host.update(doc, version, text) {
                    Ok(_) => {}
                    Err(err) => assert!(err.is_stale(), "unexpected error {}", err),
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker finished");
    }
    let latest = host.latest_version(&doc).expect("seen");
    let published = host.diagnostics(&doc).expect("published");
    assert!(published.version <= latest);
    if let Some(result) = host.result(&doc) {
        assert!(result.symbols.iter().any(|s| s.name == "SUM"));
    }
}

#[test]
fn test_update_many_groups_by_document() {
    let host = AnalysisHost::default();
    let outcomes = host.update_many(vec![
        DocumentUpdate::new(uri("a"), 1, "SUM([x])"),
        DocumentUpdate::new(uri("b"), 1, "AVG([y])"),
        DocumentUpdate::new(uri("a"), 1, "SUM([z])"),
        DocumentUpdate::new(uri("a"), 2, "SUM([z])"),
    ]);
    let a: Vec<_> = outcomes
        .iter()
        .filter(|(u, _, _)| *u == uri("a"))
        .map(|(_, version, outcome)| (*version, outcome.is_ok()))
        .collect();
    assert_eq!(a, vec![(1, true), (1, false), (2, true)]);
}

#[test]
fn test_debounced_requests() {
    let host = AnalysisHost::default();
    let doc = uri("a");
    let t0 = Instant::now();
    host.update(doc.clone(), 1, SIMPLE_AGGREGATE).expect("analyzed");
    host.schedule(doc.clone(), RequestClass::Diagnostics, 1, t0);
    host.schedule(doc.clone(), RequestClass::Completion, 1, t0);

    assert_eq!(host.next_deadline(), Some(t0 + Duration::from_millis(50)));
    let ready = host.ready_requests(t0 + Duration::from_millis(400));
    let classes: Vec<_> = ready.iter().map(|r| r.class).collect();
    assert_eq!(classes, vec![RequestClass::Completion, RequestClass::Diagnostics]);
}

#[test]
fn test_shutdown_rejects_updates() {
    let host = AnalysisHost::default();
    host.update(uri("a"), 1, SIMPLE_AGGREGATE).expect("analyzed");
    host.shutdown();
    assert!(matches!(
        host.update(uri("a"), 2, SIMPLE_AGGREGATE),
        Err(AnalysisError::ShutDown)
    ));
    assert!(host.diagnostics(&uri("a")).is_none());
}
