//! Bounded, order-preserving dispatch of classification work.
//!
//! Each candidate path gets a [`Slot`] the moment it arrives, before any
//! worker is free to take it. Slots travel downstream in crawl order while
//! the classifications behind them finish in whatever order they like, so
//! a consumer that waits on slots one by one replays results in discovery
//! order.
//!
//! Concurrency is capped by [`Permits`], a counted budget shared by every
//! scan a controller runs.

use crate::engine::ScanCancellation;
use crate::error::ScanError;
use crate::sniff::FormatSniffer;
use crate::types::{ClassifiedFile, ScanStats};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
#[cfg(feature = "logging")]
use tracing;

/// How often a blocked acquire re-checks for cancellation.
const CANCEL_POLL: Duration = Duration::from_millis(25);

/// Fixed-size pool of execution permits.
///
/// A permit is held for exactly as long as one classification runs and is
/// returned when its [`Permit`] guard drops, whatever the outcome.
#[derive(Debug)]
pub struct Permits {
    total: usize,
    avail: Mutex<usize>,
    cv: Condvar,
}

impl Permits {
    pub fn new(total: usize) -> Arc<Self> {
        let total = total.max(1);
        Arc::new(Self {
            total,
            avail: Mutex::new(total),
            cv: Condvar::new(),
        })
    }

    // Permits are released from Drop, which must not panic.
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.avail.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Snapshot; may be stale by the time it is read.
    pub fn available(&self) -> usize {
        *self.lock()
    }

    /// Blocks until a permit is free.
    pub fn acquire(self: &Arc<Self>) -> Permit {
        let mut avail = self.lock();
        while *avail == 0 {
            avail = self.cv.wait(avail).unwrap_or_else(PoisonError::into_inner);
        }
        *avail -= 1;
        Permit {
            permits: Arc::clone(self),
        }
    }

    /// Blocks until a permit is free, giving up once `cancel` fires.
    pub fn acquire_unless(self: &Arc<Self>, cancel: &ScanCancellation) -> Option<Permit> {
        let mut avail = self.lock();
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            if *avail > 0 {
                *avail -= 1;
                return Some(Permit {
                    permits: Arc::clone(self),
                });
            }
            avail = self
                .cv
                .wait_timeout(avail, CANCEL_POLL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Wakes blocked acquirers so they notice a cancellation promptly.
    pub(crate) fn wake(&self) {
        let _avail = self.lock();
        self.cv.notify_all();
    }

    fn release(&self) {
        let mut avail = self.lock();
        debug_assert!(*avail < self.total, "permit over-release");
        *avail += 1;
        self.cv.notify_one();
    }
}

/// RAII permit; returns itself to the pool on drop.
#[derive(Debug)]
pub struct Permit {
    permits: Arc<Permits>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.permits.release();
    }
}

/// Single-assignment placeholder for one path's classification.
///
/// Resolves to `Some` when the file was recognized, or `None` once its
/// [`SlotFiller`] is dropped without a value (unrecognized, unreadable, or
/// never started because the scan was cancelled).
#[derive(Debug)]
pub struct Slot {
    rx: Receiver<ClassifiedFile>,
}

/// The writing half of a [`Slot`].
#[derive(Debug)]
pub struct SlotFiller {
    tx: Sender<ClassifiedFile>,
}

/// Outcome of a bounded wait on a [`Slot`].
#[derive(Debug, PartialEq, Eq)]
pub enum Resolution {
    Ready(Option<ClassifiedFile>),
    Pending,
}

impl Slot {
    pub fn pair() -> (SlotFiller, Slot) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        (SlotFiller { tx }, Slot { rx })
    }

    /// Blocks until the slot resolves.
    pub fn wait(&self) -> Option<ClassifiedFile> {
        self.rx.recv().ok()
    }

    /// Waits for the slot to resolve, but no later than `deadline`.
    pub fn wait_until(&self, deadline: Instant) -> Resolution {
        match self.rx.recv_deadline(deadline) {
            Ok(file) => Resolution::Ready(Some(file)),
            Err(RecvTimeoutError::Disconnected) => Resolution::Ready(None),
            Err(RecvTimeoutError::Timeout) => Resolution::Pending,
        }
    }
}

impl SlotFiller {
    pub fn fill(self, file: ClassifiedFile) {
        // A full or orphaned slot simply drops the value.
        let _ = self.tx.try_send(file);
    }
}

/// Running counters for one scan.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    discovered: AtomicU64,
    classified: AtomicU64,
    skipped: AtomicU64,
}

impl Tally {
    pub(crate) fn snapshot(&self, cancelled: bool) -> ScanStats {
        ScanStats {
            discovered: self.discovered.load(Ordering::Relaxed),
            classified: self.classified.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            cancelled,
        }
    }
}

type Job = Box<dyn FnOnce() + Send>;

/// Turns the crawler's path queue into an ordered slot queue.
pub struct Dispatcher {
    sniffer: Arc<dyn FormatSniffer>,
    permits: Arc<Permits>,
    #[cfg(feature = "parallel")]
    pool: rayon::ThreadPool,
}

impl Dispatcher {
    pub fn new(sniffer: Arc<dyn FormatSniffer>, workers: usize) -> Result<Self, ScanError> {
        let permits = Permits::new(workers);
        #[cfg(feature = "parallel")]
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(permits.total())
            .thread_name(|i| format!("dwgscan-worker-{i}"))
            .build()?;
        Ok(Self {
            sniffer,
            permits,
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    pub fn permits(&self) -> &Arc<Permits> {
        &self.permits
    }

    /// Runs until `paths` closes, then waits for every started worker.
    ///
    /// `slots` is closed as soon as no further slot will be produced, so
    /// the consumer can finish draining while the last workers complete.
    #[cfg(feature = "parallel")]
    pub(crate) fn dispatch(
        &self,
        paths: Receiver<PathBuf>,
        slots: Sender<Slot>,
        cancel: &ScanCancellation,
        tally: &Arc<Tally>,
    ) {
        self.pool.in_place_scope(|scope| {
            self.feed(paths, slots, cancel, tally, |job| scope.spawn(move |_| job()));
        });
    }

    #[cfg(not(feature = "parallel"))]
    pub(crate) fn dispatch(
        &self,
        paths: Receiver<PathBuf>,
        slots: Sender<Slot>,
        cancel: &ScanCancellation,
        tally: &Arc<Tally>,
    ) {
        std::thread::scope(|scope| {
            self.feed(paths, slots, cancel, tally, |job| {
                scope.spawn(job);
            });
        });
    }

    fn feed(
        &self,
        paths: Receiver<PathBuf>,
        slots: Sender<Slot>,
        cancel: &ScanCancellation,
        tally: &Arc<Tally>,
        mut spawn: impl FnMut(Job),
    ) {
        for path in paths.iter() {
            if cancel.is_cancelled() {
                break;
            }
            tally.discovered.fetch_add(1, Ordering::Relaxed);
            let (filler, slot) = Slot::pair();
            if slots.send(slot).is_err() {
                break;
            }
            let Some(permit) = self.permits.acquire_unless(cancel) else {
                break;
            };
            let sniffer = Arc::clone(&self.sniffer);
            let tally = Arc::clone(tally);
            spawn(Box::new(move || {
                let _permit = permit;
                match sniffer.classify(&path) {
                    Ok(version) => {
                        tally.classified.fetch_add(1, Ordering::Relaxed);
                        filler.fill(ClassifiedFile { path, version });
                    }
                    Err(_e) => {
                        tally.skipped.fetch_add(1, Ordering::Relaxed);
                        #[cfg(feature = "logging")]
                        tracing::debug!("Skipping {}: {}", path.display(), _e);
                    }
                }
            }));
        }
        drop(slots);
        // Keep the crawler unblocked until it notices the cancellation.
        for _ in paths.iter() {}
    }
}
