use std::path::PathBuf;
use thiserror::Error;
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Invalid exclude pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: globset::Error,
    },
    #[error("Failed to serialize results: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("Failed to spawn scan thread: {0}")]
    Spawn(std::io::Error),
    #[cfg(feature = "parallel")]
    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
impl ScanError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScanError::Io {
            path: path.into(),
            source,
        }
    }
}
/// Why a single file produced no classification.
///
/// These never leave the pipeline: a failed sniff resolves its slot to
/// "no result" and the file is silently omitted.
#[derive(Debug, Error)]
pub enum SniffError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Not a drawing file: {0}")]
    NotRecognized(PathBuf),
}
impl SniffError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SniffError::Io {
            path: path.into(),
            source,
        }
    }
}
