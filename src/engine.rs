use crate::collect::{ResultCollector, ResultSink};
use crate::crawl::PathCrawler;
use crate::dispatch::{Dispatcher, Tally};
use crate::error::ScanError;
use crate::options::ScanOptions;
use crate::sniff::{DwgSniffer, FormatSniffer};
use crate::types::ScanStats;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
#[cfg(feature = "logging")]
use std::time::Instant;
#[cfg(feature = "logging")]
use tracing;
/// Cooperative cancellation signal shared by every stage of one scan.
#[derive(Debug, Clone, Default)]
pub struct ScanCancellation {
    flag: Arc<AtomicBool>,
}
impl ScanCancellation {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
/// One-way gate: once set it stays set and releases every waiter.
#[derive(Debug, Default)]
pub struct Latch {
    set: Mutex<bool>,
    cv: Condvar,
}
impl Latch {
    pub fn new() -> Self {
        Self::default()
    }
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.set.lock().unwrap_or_else(PoisonError::into_inner)
    }
    pub fn set(&self) {
        *self.lock() = true;
        self.cv.notify_all();
    }
    pub fn is_set(&self) -> bool {
        *self.lock()
    }
    pub fn wait(&self) {
        let mut set = self.lock();
        while !*set {
            set = self.cv.wait(set).unwrap_or_else(PoisonError::into_inner);
        }
    }
}
/// Sets the latch even if the scan thread unwinds.
struct SetOnDrop(Arc<Latch>);
impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.set();
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Running,
}
/// Per-run state owned by the controller.
struct ScanSession {
    cancel: ScanCancellation,
    terminated: Arc<Latch>,
    handle: JoinHandle<()>,
}
/// Everything the scan thread needs for one run.
struct ScanRun {
    root: PathBuf,
    crawler: Arc<PathCrawler>,
    dispatcher: Arc<Dispatcher>,
    collector: ResultCollector,
    queue_capacity: usize,
    cancel: ScanCancellation,
    terminated: Arc<Latch>,
    last_stats: Arc<Mutex<Option<ScanStats>>>,
}
impl ScanRun {
    fn execute(self, on_started: impl FnOnce(), on_finished: impl FnOnce()) {
        let _terminated = SetOnDrop(Arc::clone(&self.terminated));
        #[cfg(feature = "logging")]
        let started = Instant::now();
        #[cfg(feature = "logging")]
        tracing::debug!("Starting scan of {}", self.root.display());
        on_started();
        self.collector.reset();
        let tally = Arc::new(Tally::default());
        let (path_tx, path_rx) = crossbeam_channel::bounded(self.queue_capacity);
        let (slot_tx, slot_rx) = crossbeam_channel::bounded(self.queue_capacity);
        let (root, crawler, dispatcher, cancel) =
            (&self.root, &self.crawler, &self.dispatcher, &self.cancel);
        let tally_ref = &tally;
        thread::scope(|scope| {
            scope.spawn(move || crawler.crawl(root, cancel, path_tx));
            scope.spawn(move || dispatcher.dispatch(path_rx, slot_tx, cancel, tally_ref));
            self.collector.collect(slot_rx, cancel);
        });
        let stats = tally.snapshot(self.cancel.is_cancelled());
        #[cfg(feature = "logging")]
        tracing::debug!(
            discovered = stats.discovered,
            classified = stats.classified,
            skipped = stats.skipped,
            cancelled = stats.cancelled,
            "Scan of {} finished in {:?}",
            self.root.display(),
            started.elapsed()
        );
        *self
            .last_stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(stats);
        on_finished();
    }
}
/// Owns the lifecycle of at most one scan at a time.
///
/// The worker ceiling is fixed when the controller is built and shared by
/// every scan it runs. Starting a scan while another is live first stops
/// the old one and waits for it to drain, so two scans never touch the
/// sink at once.
pub struct ScanController {
    options: ScanOptions,
    crawler: Arc<PathCrawler>,
    dispatcher: Arc<Dispatcher>,
    sink: Arc<dyn ResultSink>,
    session: Mutex<Option<ScanSession>>,
    last_stats: Arc<Mutex<Option<ScanStats>>>,
}
impl ScanController {
    /// Controller that sniffs DWG headers.
    pub fn new(options: ScanOptions, sink: Arc<dyn ResultSink>) -> Result<Self, ScanError> {
        Self::with_sniffer(options, sink, Arc::new(DwgSniffer))
    }
    pub fn with_sniffer(
        options: ScanOptions,
        sink: Arc<dyn ResultSink>,
        sniffer: Arc<dyn FormatSniffer>,
    ) -> Result<Self, ScanError> {
        let policy = options.exclusion_policy()?;
        let dispatcher = Dispatcher::new(sniffer, options.workers)?;
        Ok(Self {
            crawler: Arc::new(PathCrawler::new(options.clone(), policy)),
            dispatcher: Arc::new(dispatcher),
            options,
            sink,
            session: Mutex::new(None),
            last_stats: Arc::new(Mutex::new(None)),
        })
    }
    pub fn workers(&self) -> usize {
        self.dispatcher.permits().total()
    }
    /// Classification permits not currently held by any scan.
    pub fn idle_workers(&self) -> usize {
        self.dispatcher.permits().available()
    }
    fn lock_session(&self) -> MutexGuard<'_, Option<ScanSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
    /// Starts scanning `root`, replacing any scan in progress.
    ///
    /// `on_started` and `on_finished` run on the scan thread, each exactly
    /// once. They must not call back into [`ScanController::start`] or
    /// [`ScanController::stop`] synchronously.
    ///
    /// # Errors
    ///
    /// Fails without disturbing a running scan if `root` is missing or is
    /// not a directory.
    pub fn start<S, F>(
        &self,
        root: impl AsRef<Path>,
        on_started: S,
        on_finished: F,
    ) -> Result<(), ScanError>
    where
        S: FnOnce() + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        let root = root.as_ref();
        let metadata = fs::metadata(root).map_err(|e| ScanError::io(root, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }
        let mut session = self.lock_session();
        self.stop_locked(&mut session);
        let cancel = ScanCancellation::new();
        let terminated = Arc::new(Latch::new());
        let run = ScanRun {
            root: root.to_path_buf(),
            crawler: Arc::clone(&self.crawler),
            dispatcher: Arc::clone(&self.dispatcher),
            collector: ResultCollector::new(Arc::clone(&self.sink), self.options.flush_interval),
            queue_capacity: self.options.queue_capacity.max(1),
            cancel: cancel.clone(),
            terminated: Arc::clone(&terminated),
            last_stats: Arc::clone(&self.last_stats),
        };
        let handle = thread::Builder::new()
            .name("dwgscan-scan".into())
            .spawn(move || run.execute(on_started, on_finished))
            .map_err(ScanError::Spawn)?;
        *session = Some(ScanSession {
            cancel,
            terminated,
            handle,
        });
        Ok(())
    }
    /// Cancels the running scan and waits until it has fully drained.
    ///
    /// Returns `false` when there was nothing to stop.
    pub fn stop(&self) -> bool {
        let mut session = self.lock_session();
        self.stop_locked(&mut session)
    }
    fn stop_locked(&self, session: &mut Option<ScanSession>) -> bool {
        let Some(current) = session.take() else {
            return false;
        };
        let stopped = !current.terminated.is_set();
        if stopped {
            current.cancel.cancel();
            self.dispatcher.permits().wake();
            #[cfg(feature = "logging")]
            tracing::debug!("Cancelling running scan");
        }
        if current.handle.join().is_err() {
            #[cfg(feature = "logging")]
            tracing::debug!("Scan thread panicked");
        }
        stopped
    }
    /// Blocks until the current scan, if any, ends on its own.
    pub fn wait(&self) {
        let latch = self
            .lock_session()
            .as_ref()
            .map(|s| Arc::clone(&s.terminated));
        if let Some(latch) = latch {
            latch.wait();
        }
    }
    pub fn state(&self) -> ScanState {
        match self.lock_session().as_ref() {
            Some(s) if !s.terminated.is_set() => ScanState::Running,
            _ => ScanState::Idle,
        }
    }
    /// Counters from the most recently finished scan.
    pub fn last_stats(&self) -> Option<ScanStats> {
        *self
            .last_stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
impl Drop for ScanController {
    fn drop(&mut self) {
        self.stop();
    }
}
