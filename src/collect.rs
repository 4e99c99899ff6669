use crate::dispatch::{Resolution, Slot};
use crate::engine::ScanCancellation;
use crate::output::{SortKey, SortOrder, sort_results};
use crate::types::ClassifiedFile;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Where a scan publishes its results.
///
/// The pipeline only ever clears and appends; `snapshot` exists for the
/// caller. Implementations synchronize internally so readers see either
/// the state before an append or the state after it.
pub trait ResultSink: Send + Sync {
    fn clear(&self);
    fn append(&self, files: Vec<ClassifiedFile>);
    fn snapshot(&self) -> Vec<ClassifiedFile>;
}

/// In-memory result list behind a read/write lock.
#[derive(Debug, Default)]
pub struct ScanResults {
    files: RwLock<Vec<ClassifiedFile>>,
}

impl ScanResults {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.files.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reorders the held results for display. Stable.
    pub fn sort(&self, key: SortKey, order: SortOrder) {
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        sort_results(&mut files, key, order);
    }
}

impl ResultSink for ScanResults {
    fn clear(&self) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn append(&self, files: Vec<ClassifiedFile>) {
        if files.is_empty() {
            return;
        }
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(files);
    }

    fn snapshot(&self) -> Vec<ClassifiedFile> {
        self.files.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);
const MAX_FLUSH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Replays slots in creation order and publishes them in timed batches.
pub struct ResultCollector {
    sink: Arc<dyn ResultSink>,
    interval: Duration,
}

impl ResultCollector {
    pub fn new(sink: Arc<dyn ResultSink>, interval: Duration) -> Self {
        Self {
            sink,
            interval: interval.clamp(MIN_FLUSH_INTERVAL, MAX_FLUSH_INTERVAL),
        }
    }

    /// Empties the sink so a new scan starts from nothing.
    pub fn reset(&self) {
        self.sink.clear();
    }

    /// Drains `slots` until the queue closes and returns how many results
    /// reached the sink.
    ///
    /// A batch is flushed whenever `interval` elapses, even while waiting on
    /// a slow slot, and once more at the end. After `cancel` fires results
    /// are discarded instead of flushed.
    pub fn collect(&self, slots: Receiver<Slot>, cancel: &ScanCancellation) -> usize {
        let mut batch = Vec::new();
        let mut published = 0;
        let mut deadline = Instant::now() + self.interval;
        let mut pending: Option<Slot> = None;
        loop {
            if Instant::now() >= deadline {
                published += self.flush(&mut batch, cancel);
                deadline = Instant::now() + self.interval;
            }
            let slot = match pending.take() {
                Some(slot) => slot,
                None => match slots.recv_deadline(deadline) {
                    Ok(slot) => slot,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
            };
            match slot.wait_until(deadline) {
                Resolution::Ready(Some(file)) => batch.push(file),
                Resolution::Ready(None) => {}
                Resolution::Pending => pending = Some(slot),
            }
        }
        published + self.flush(&mut batch, cancel)
    }

    fn flush(&self, batch: &mut Vec<ClassifiedFile>, cancel: &ScanCancellation) -> usize {
        if cancel.is_cancelled() {
            batch.clear();
            return 0;
        }
        let count = batch.len();
        if count > 0 {
            self.sink.append(std::mem::take(batch));
        }
        count
    }
}
