use crate::error::ScanError;
use crate::exclude::ExclusionPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
pub const DEFAULT_WORKERS: usize = 32;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Candidate file extension, compared case-insensitively, without the dot.
    pub extension: String,
    /// Ceiling on simultaneous classifications, fixed per controller.
    pub workers: usize,
    pub flush_interval: Duration,
    /// Capacity of the path and slot queues between pipeline stages.
    pub queue_capacity: usize,
    pub exclude_patterns: Vec<String>,
    pub follow_links: bool,
}
impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extension: "dwg".to_string(),
            workers: DEFAULT_WORKERS,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            exclude_patterns: Vec::new(),
            follow_links: false,
        }
    }
}
impl ScanOptions {
    pub fn exclusion_policy(&self) -> Result<ExclusionPolicy, ScanError> {
        ExclusionPolicy::with_patterns(self.exclude_patterns.as_slice())
    }
    pub(crate) fn matches_extension(&self, name: &str) -> bool {
        let ext = self.extension.trim_start_matches('.');
        name.len() > ext.len()
            && name
                .rsplit_once('.')
                .is_some_and(|(_, tail)| tail.eq_ignore_ascii_case(ext))
    }
}
#[derive(Debug, Default)]
pub struct ScanBuilder {
    options: ScanOptions,
}
impl ScanBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.options.extension = ext.into();
        self
    }
    pub fn workers(mut self, workers: usize) -> Self {
        self.options.workers = workers.max(1);
        self
    }
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.options.flush_interval = interval;
        self
    }
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.options.queue_capacity = capacity.max(1);
        self
    }
    pub fn exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.options.exclude_patterns = patterns;
        self
    }
    pub fn follow_links(mut self, yes: bool) -> Self {
        self.options.follow_links = yes;
        self
    }
    pub fn build(self) -> ScanOptions {
        self.options
    }
}
