use dwgscan::{
    DrawingVersion, DwgSniffer, FormatSniffer, PathCrawler, ResultSink, ScanBuilder,
    ScanCancellation, ScanController, ScanError, ScanResults, ScanState, SniffError,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn drawing(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"AC1018\x00\x00drawing body").unwrap();
}

fn crawl_order(root: &Path) -> Vec<PathBuf> {
    let options = ScanBuilder::new().build();
    let crawler = PathCrawler::new(options.clone(), options.exclusion_policy().unwrap());
    crawler.paths(root, &ScanCancellation::new()).collect()
}

fn wait_for(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

fn slow_sniffer(delay: Duration) -> Arc<dyn FormatSniffer> {
    Arc::new(move |path: &Path| -> Result<DrawingVersion, SniffError> {
        thread::sleep(delay);
        DwgSniffer.classify(path)
    })
}

#[test]
fn results_follow_discovery_order_not_completion_order() {
    let dir = tempdir().unwrap();
    for i in 0..24 {
        drawing(&dir.path().join(format!("d{}", i % 3)).join(format!("f{i:02}.dwg")));
    }
    let expected = crawl_order(dir.path());
    assert_eq!(expected.len(), 24);
    let rank: HashMap<PathBuf, usize> = expected.iter().cloned().zip(0..).collect();
    let total = expected.len() as u64;
    // Earlier discoveries take longest, so completion order is reversed.
    let sniffer = Arc::new(move |path: &Path| -> Result<DrawingVersion, SniffError> {
        let i = rank[path] as u64;
        thread::sleep(Duration::from_millis((total - i) * 3));
        DwgSniffer.classify(path)
    });
    let results = ScanResults::new();
    let options = ScanBuilder::new()
        .workers(8)
        .flush_interval(Duration::from_millis(10))
        .build();
    let scanner = ScanController::with_sniffer(options, results.clone(), sniffer).unwrap();
    scanner.start(dir.path(), || {}, || {}).unwrap();
    scanner.wait();
    let paths: Vec<PathBuf> = results.snapshot().into_iter().map(|f| f.path).collect();
    assert_eq!(paths, expected);
}

#[test]
fn classification_concurrency_never_exceeds_workers() {
    let dir = tempdir().unwrap();
    for i in 0..30 {
        drawing(&dir.path().join(format!("f{i}.dwg")));
    }
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let sniffer = {
        let (current, peak) = (Arc::clone(&current), Arc::clone(&peak));
        Arc::new(move |path: &Path| -> Result<DrawingVersion, SniffError> {
            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            assert!(now <= 3, "{now} classifications running at once");
            thread::sleep(Duration::from_millis(10));
            current.fetch_sub(1, Ordering::SeqCst);
            DwgSniffer.classify(path)
        })
    };
    let results = ScanResults::new();
    let options = ScanBuilder::new().workers(3).build();
    let scanner = ScanController::with_sniffer(options, results.clone(), sniffer).unwrap();
    assert_eq!(scanner.workers(), 3);
    scanner.start(dir.path(), || {}, || {}).unwrap();
    scanner.wait();
    assert_eq!(results.len(), 30);
    let peak = peak.load(Ordering::SeqCst);
    assert!((1..=3).contains(&peak));
}

#[test]
fn stop_on_idle_controller_is_a_no_op() {
    let results = ScanResults::new();
    let scanner = ScanController::new(ScanBuilder::new().build(), results.clone()).unwrap();
    assert!(!scanner.stop());
    assert!(!scanner.stop());
    assert_eq!(scanner.state(), ScanState::Idle);
    assert!(results.is_empty());
    assert!(scanner.last_stats().is_none());
}

#[test]
fn stop_cancels_a_running_scan_once() {
    let dir = tempdir().unwrap();
    for i in 0..20 {
        drawing(&dir.path().join(format!("f{i:02}.dwg")));
    }
    let finished = Arc::new(AtomicUsize::new(0));
    let results = ScanResults::new();
    let options = ScanBuilder::new().workers(1).build();
    let scanner = ScanController::with_sniffer(
        options,
        results.clone(),
        slow_sniffer(Duration::from_millis(50)),
    )
    .unwrap();
    let counter = Arc::clone(&finished);
    scanner
        .start(dir.path(), || {}, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(scanner.state(), ScanState::Running);
    assert!(scanner.stop());
    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert_eq!(scanner.idle_workers(), scanner.workers());
    assert!(!scanner.stop());
    assert_eq!(scanner.state(), ScanState::Idle);
    let stats = scanner.last_stats().unwrap();
    assert!(stats.cancelled);
    assert!(stats.classified < 20);
    // Nothing flushed after the cancellation point shows up later.
    let settled = results.len();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(results.len(), settled);
}

#[test]
fn stop_after_completion_reports_nothing_stopped() {
    let dir = tempdir().unwrap();
    drawing(&dir.path().join("one.dwg"));
    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));
    let results = ScanResults::new();
    let scanner = ScanController::new(ScanBuilder::new().build(), results.clone()).unwrap();
    let (s, f) = (Arc::clone(&started), Arc::clone(&finished));
    scanner
        .start(
            dir.path(),
            move || {
                s.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                f.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();
    scanner.wait();
    assert!(!scanner.stop());
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert_eq!(results.len(), 1);
    assert!(!scanner.last_stats().unwrap().cancelled);
}

#[test]
fn restarting_replaces_previous_results() {
    let a = tempdir().unwrap();
    let b = tempdir().unwrap();
    for i in 0..10 {
        drawing(&a.path().join(format!("a{i}.dwg")));
    }
    drawing(&b.path().join("b0.dwg"));
    drawing(&b.path().join("sub/b1.dwg"));
    let results = ScanResults::new();
    let options = ScanBuilder::new()
        .workers(1)
        .flush_interval(Duration::from_millis(10))
        .build();
    let scanner = ScanController::with_sniffer(
        options,
        results.clone(),
        slow_sniffer(Duration::from_millis(20)),
    )
    .unwrap();
    scanner.start(a.path(), || {}, || {}).unwrap();
    assert!(wait_for(|| !results.is_empty()));
    scanner.start(b.path(), || {}, || {}).unwrap();
    scanner.wait();
    let files = results.snapshot();
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|f| f.path.starts_with(b.path())));
}

#[test]
fn permits_are_all_returned_between_scans() {
    let dir = tempdir().unwrap();
    for i in 0..12 {
        drawing(&dir.path().join(format!("f{i:02}.dwg")));
    }
    let results = ScanResults::new();
    let options = ScanBuilder::new().workers(4).build();
    let scanner = ScanController::with_sniffer(
        options,
        results.clone(),
        slow_sniffer(Duration::from_millis(40)),
    )
    .unwrap();
    for _ in 0..3 {
        scanner.start(dir.path(), || {}, || {}).unwrap();
        thread::sleep(Duration::from_millis(20));
        scanner.stop();
        assert_eq!(scanner.idle_workers(), 4);
    }
    scanner.start(dir.path(), || {}, || {}).unwrap();
    scanner.wait();
    assert_eq!(results.len(), 12);
    assert_eq!(scanner.idle_workers(), 4);
}

#[test]
fn excluded_directories_yield_nothing() {
    let dir = tempdir().unwrap();
    drawing(&dir.path().join("$RECYCLE.BIN/deleted.dwg"));
    drawing(&dir.path().join("System Volume Information/nested/x.dwg"));
    drawing(&dir.path().join("archive/old.dwg"));
    drawing(&dir.path().join("projects/site.dwg"));
    let results = ScanResults::new();
    let options = ScanBuilder::new()
        .exclude_patterns(vec!["arch*".to_string()])
        .build();
    let scanner = ScanController::new(options, results.clone()).unwrap();
    scanner.start(dir.path(), || {}, || {}).unwrap();
    scanner.wait();
    let files = results.snapshot();
    assert_eq!(files.len(), 1);
    assert!(files[0].path.ends_with("projects/site.dwg"));
}

#[test]
fn results_become_visible_before_the_scan_ends() {
    let dir = tempdir().unwrap();
    for i in 0..3 {
        drawing(&dir.path().join(format!("f{i}.dwg")));
    }
    let classified_at = Arc::new(Mutex::new(None::<Instant>));
    let sniffer = {
        let classified_at = Arc::clone(&classified_at);
        Arc::new(move |path: &Path| -> Result<DrawingVersion, SniffError> {
            thread::sleep(Duration::from_millis(400));
            let version = DwgSniffer.classify(path);
            classified_at.lock().unwrap().get_or_insert_with(Instant::now);
            version
        })
    };
    let results = ScanResults::new();
    let options = ScanBuilder::new()
        .workers(1)
        .flush_interval(Duration::from_millis(200))
        .build();
    let scanner = ScanController::with_sniffer(options, results.clone(), sniffer).unwrap();
    scanner.start(dir.path(), || {}, || {}).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while results.is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
    let visible_at = Instant::now();
    assert!(!results.is_empty());
    assert_eq!(scanner.state(), ScanState::Running);
    let classified_at = classified_at.lock().unwrap().unwrap();
    let lag = visible_at.duration_since(classified_at);
    assert!(lag <= Duration::from_millis(250), "first result took {lag:?} to appear");
    scanner.wait();
    assert_eq!(results.len(), 3);
}

#[test]
fn short_and_foreign_headers_never_reach_the_sink() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("short.dwg"), b"AC1").unwrap();
    fs::write(dir.path().join("foreign.dwg"), b"hello world").unwrap();
    fs::write(dir.path().join("empty.dwg"), b"").unwrap();
    fs::write(dir.path().join("GOOD.DWG"), b"AC1015rest").unwrap();
    fs::write(dir.path().join("notes.txt"), b"AC1015rest").unwrap();
    let results = ScanResults::new();
    let scanner = ScanController::new(ScanBuilder::new().build(), results.clone()).unwrap();
    scanner.start(dir.path(), || {}, || {}).unwrap();
    scanner.wait();
    let files = results.snapshot();
    assert_eq!(files.len(), 1);
    assert!(files[0].path.ends_with("GOOD.DWG"));
    assert_eq!(files[0].version, DrawingVersion::Ac1015);
    let stats = scanner.last_stats().unwrap();
    assert_eq!(stats.discovered, 4);
    assert_eq!(stats.classified, 1);
    assert_eq!(stats.skipped, 3);
}

#[test]
fn invalid_roots_are_rejected_up_front() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("plain.dwg");
    drawing(&file);
    let scanner = ScanController::new(ScanBuilder::new().build(), ScanResults::new()).unwrap();
    assert!(matches!(
        scanner.start(dir.path().join("missing"), || {}, || {}),
        Err(ScanError::Io { .. })
    ));
    assert!(matches!(
        scanner.start(&file, || {}, || {}),
        Err(ScanError::NotADirectory(_))
    ));
    assert_eq!(scanner.state(), ScanState::Idle);
}

#[test]
fn bad_exclude_pattern_fails_construction() {
    let options = ScanBuilder::new()
        .exclude_patterns(vec!["[unterminated".to_string()])
        .build();
    assert!(matches!(
        ScanController::new(options, ScanResults::new()),
        Err(ScanError::InvalidPattern { .. })
    ));
}
