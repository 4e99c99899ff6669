//! # dwgscan
//!
//! `dwgscan` crawls a directory tree for drawing files, classifies each one by
//! sniffing its version header, and streams the results into a sink in the
//! order the files were discovered, however the parallel work happens to
//! finish. Scans can be cancelled and restarted at any time.
//!
//! It also provides a lazily populated directory tree ([`DirectoryNode`]) for
//! browsing, which lists each directory at most once however many threads ask.
//!
//! # Features
//!
//! - `parallel`: Runs classifications on a Rayon pool sized to the worker ceiling.
//! - `logging`: Enables debug logging via the `tracing` crate.
//!
//! # Example
//!
//! ```no_run
//! use dwgscan::{ScanBuilder, ScanController, ScanResults, ResultSink};
//! use std::time::Duration;
//!
//! let options = ScanBuilder::new()
//!     .workers(16)
//!     .flush_interval(Duration::from_millis(200))
//!     .build();
//!
//! let results = ScanResults::new();
//! let scanner = ScanController::new(options, results.clone()).expect("Failed to build scanner");
//!
//! scanner
//!     .start("/srv/drawings", || println!("scanning"), || println!("done"))
//!     .expect("Failed to start scan");
//! scanner.wait();
//!
//! for file in results.snapshot() {
//!     println!("{}  {}", file.path.display(), file.version);
//! }
//! ```

mod collect;
mod crawl;
mod dispatch;
mod engine;
mod error;
mod exclude;
mod options;
pub mod output;
mod sniff;
mod tree;
mod types;

pub use collect::{ResultCollector, ResultSink, ScanResults};
pub use crawl::PathCrawler;
pub use dispatch::{Permit, Permits, Resolution, Slot, SlotFiller};
pub use engine::{Latch, ScanCancellation, ScanController, ScanState};
pub use error::{ScanError, SniffError};
pub use exclude::{ExclusionPolicy, RESERVED_NAMES};
pub use options::{
    DEFAULT_FLUSH_INTERVAL, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS, ScanBuilder, ScanOptions,
};
pub use sniff::{DwgSniffer, FormatSniffer};
pub use tree::{Children, DirectoryNode, DirectoryTree, render_tree, system_roots};
pub use types::{ClassifiedFile, DrawingVersion, ScanStats};
