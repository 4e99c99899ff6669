use crate::engine::ScanCancellation;
use crate::exclude::ExclusionPolicy;
use crate::options::ScanOptions;
use crossbeam_channel::Sender;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
#[cfg(feature = "logging")]
use tracing;
/// Depth-first walker yielding candidate drawing paths.
///
/// Every call to [`PathCrawler::paths`] starts a fresh walk, so one crawler
/// serves any number of scans.
#[derive(Debug, Clone)]
pub struct PathCrawler {
    options: ScanOptions,
    policy: ExclusionPolicy,
}
impl PathCrawler {
    pub fn new(options: ScanOptions, policy: ExclusionPolicy) -> Self {
        Self { options, policy }
    }
    fn walker(&self, root: &Path) -> ignore::Walk {
        let mut builder = WalkBuilder::new(root);
        builder
            .standard_filters(false)
            .follow_links(self.options.follow_links);
        let policy = self.policy.clone();
        builder.filter_entry(move |entry| {
            entry.depth() == 0 || !policy.should_exclude(&entry.file_name().to_string_lossy())
        });
        builder.build()
    }
    /// Lazily walks `root` in pre-order, stopping as soon as `cancel` fires.
    ///
    /// Unreadable directories and entries are skipped; the walk carries on
    /// with their siblings.
    pub fn paths<'a>(
        &'a self,
        root: &Path,
        cancel: &'a ScanCancellation,
    ) -> impl Iterator<Item = PathBuf> + 'a {
        self.walker(root)
            .take_while(move |_| !cancel.is_cancelled())
            .filter_map(|result| match result {
                Ok(entry) => Some(entry),
                Err(_e) => {
                    #[cfg(feature = "logging")]
                    tracing::debug!("Skipping unreadable entry: {}", _e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|t| !t.is_dir()))
            .filter(move |entry| {
                self.options
                    .matches_extension(&entry.file_name().to_string_lossy())
            })
            .map(|entry| entry.into_path())
    }
    /// Feeds the walk into `queue`, blocking while it is full.
    pub(crate) fn crawl(&self, root: &Path, cancel: &ScanCancellation, queue: Sender<PathBuf>) {
        for path in self.paths(root, cancel) {
            if queue.send(path).is_err() {
                break;
            }
        }
        #[cfg(feature = "logging")]
        tracing::debug!(
            cancelled = cancel.is_cancelled(),
            "Crawl of {} finished",
            root.display()
        );
    }
}
