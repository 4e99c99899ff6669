//! Command-line interface for dwgscan.
//!
//! `scan` crawls a directory for drawing files and prints their versions;
//! `tree` renders the lazily listed directory tree.

use clap::{Parser, Subcommand, ValueEnum};
use dwgscan::output::{self, SortKey, SortOrder};
use dwgscan::{
    DirectoryNode, DirectoryTree, ExclusionPolicy, ResultSink, ScanBuilder, ScanController,
    ScanResults, render_tree,
};
use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;

/// dwgscan — find drawing files and report their format versions
#[derive(Parser)]
#[command(name = "dwgscan", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory tree and classify every drawing found
    Scan {
        /// Root directory (default current dir)
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Maximum concurrent classifications
        #[arg(short, long, default_value_t = dwgscan::DEFAULT_WORKERS)]
        workers: usize,

        /// Candidate file extension
        #[arg(long = "ext", default_value = "dwg")]
        extension: String,

        /// Extra names or globs to exclude (can be repeated)
        #[arg(short = 'x', long = "exclude")]
        exclude_patterns: Vec<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Sort results instead of keeping discovery order
        #[arg(long, value_enum)]
        sort: Option<SortColumn>,

        /// Sort descending
        #[arg(long, requires = "sort")]
        desc: bool,

        /// Pretty output (indented JSON)
        #[arg(short, long)]
        pretty: bool,

        /// Write results to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Result flush interval in milliseconds
        #[arg(long, default_value_t = 200)]
        interval_ms: u64,
    },
    /// Render the directory tree
    Tree {
        /// Directory to start from (default: every system root)
        root: Option<PathBuf>,

        /// Levels to expand below each root
        #[arg(short, long, default_value_t = 1)]
        depth: usize,

        /// Extra names or globs to exclude (can be repeated)
        #[arg(short = 'x', long = "exclude")]
        exclude_patterns: Vec<String>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Markdown,
    Json,
    Paths,
}

impl From<OutputFormat> for output::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => output::OutputFormat::Text,
            OutputFormat::Markdown => output::OutputFormat::Markdown,
            OutputFormat::Json => output::OutputFormat::Json,
            OutputFormat::Paths => output::OutputFormat::Paths,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum SortColumn {
    Path,
    Version,
}

fn main() {
    #[cfg(feature = "logging")]
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Scan {
            root,
            workers,
            extension,
            exclude_patterns,
            format,
            sort,
            desc,
            pretty,
            output: output_file,
            interval_ms,
        } => {
            let options = ScanBuilder::new()
                .workers(workers)
                .extension(extension)
                .exclude_patterns(exclude_patterns)
                .flush_interval(Duration::from_millis(interval_ms))
                .build();
            let order = if desc {
                SortOrder::Descending
            } else {
                SortOrder::Ascending
            };
            let sort = sort.map(|column| match column {
                SortColumn::Path => (SortKey::Path, order),
                SortColumn::Version => (SortKey::Version, order),
            });
            run_scan(options, root, format.into(), sort, pretty, output_file);
        }
        Command::Tree {
            root,
            depth,
            exclude_patterns,
        } => run_tree(root, depth, &exclude_patterns),
    }
}

fn run_scan(
    options: dwgscan::ScanOptions,
    root: PathBuf,
    format: output::OutputFormat,
    sort: Option<(SortKey, SortOrder)>,
    pretty: bool,
    output_file: Option<PathBuf>,
) {
    let results = ScanResults::new();
    let scanner = ScanController::new(options, results.clone()).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        exit(1);
    });
    if let Err(e) = scanner.start(&root, || {}, || {}) {
        eprintln!("Error: {}", e);
        exit(1);
    }
    scanner.wait();
    if let Some((key, order)) = sort {
        results.sort(key, order);
    }
    let files = results.snapshot();
    let written = match output_file {
        Some(path) => output::write_results_to_file(&files, format, path, pretty)
            .map(|target| eprintln!("Results written to {}", target.display())),
        None => output::format_results(&files, format, pretty).map(|out| print!("{}", out)),
    };
    if let Err(e) = written {
        eprintln!("Error: {}", e);
        exit(1);
    }
    if let Some(stats) = scanner.last_stats() {
        eprintln!(
            "{} candidates, {} drawings, {} skipped",
            stats.discovered, stats.classified, stats.skipped
        );
    }
}

fn run_tree(root: Option<PathBuf>, depth: usize, exclude_patterns: &[String]) {
    let policy = ExclusionPolicy::with_patterns(exclude_patterns).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        exit(1);
    });
    let roots = match root {
        Some(root) => vec![DirectoryNode::root(root.into_os_string(), policy)],
        None => DirectoryTree::discover(policy).roots().to_vec(),
    };
    for node in roots {
        println!("{}", render_tree(&node, depth));
    }
}
